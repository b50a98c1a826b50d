//! Template binding
//!
//! A template carries slots tagged with a [`BindingRole`]. The roles present
//! in a template are resolved once into a [`BindingDescriptor`], which then
//! binds any number of products by cloning the template and running one
//! setter per role. Roles missing from the markup are skipped.

use std::fmt;

use crate::error::GridError;
use crate::format::MoneyFormat;
use crate::query::{Product, ProductImage};
use crate::settle::SettleTicket;

// ============================================================================
// Roles and states
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingRole {
    ExternalLink,
    Image,
    Title,
    Price,
    CompareAtPrice,
}

impl BindingRole {
    pub const ALL: [BindingRole; 5] = [
        BindingRole::ExternalLink,
        BindingRole::Image,
        BindingRole::Title,
        BindingRole::Price,
        BindingRole::CompareAtPrice,
    ];

    /// Token used in markup (`data-bind="product-title"`)
    pub fn token(&self) -> &'static str {
        match self {
            BindingRole::ExternalLink => "product-external-link",
            BindingRole::Image => "product-image",
            BindingRole::Title => "product-title",
            BindingRole::Price => "product-price",
            BindingRole::CompareAtPrice => "product-compare-at-price",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.token() == token)
    }
}

/// Lifecycle of one rendered item
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    /// Bound, image still loading
    Loading,
    /// Image settled
    Ready,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Loading => "loading",
            ItemState::Ready => "ready",
        }
    }
}

// ============================================================================
// Platform traits
// ============================================================================

/// A bindable location inside a rendered item
pub trait Slot {
    fn set_href(&self, href: &str);

    fn set_text(&self, text: &str);

    /// Swap in a freshly constructed image for `image`.
    ///
    /// Implementations must arrange for `ticket` to be settled exactly once
    /// when the image loads or fails, attaching their listeners before the
    /// source is assigned so a cached image is not missed.
    fn load_image(&self, image: &ProductImage, ticket: SettleTicket);
}

/// One cloned template, bound to one product
pub trait RenderInstance: Clone + 'static {
    type Slot: Slot;

    fn slot(&self, role: BindingRole) -> Option<Self::Slot>;

    fn set_state(&self, state: ItemState);
}

/// Source markup that items are cloned from
pub trait Template {
    type Instance: RenderInstance;

    /// Deep clone of the template
    fn instantiate(&self) -> Result<Self::Instance, GridError>;

    fn has_slot(&self, role: BindingRole) -> bool;
}

// ============================================================================
// Descriptor
// ============================================================================

/// Everything a setter may need
pub struct BindContext<'a> {
    pub product: &'a Product,
    pub money: &'a MoneyFormat,
    /// The item's settle ticket, taken by the image setter
    pub ticket: Option<SettleTicket>,
}

pub type Setter<S> = fn(&S, &mut BindContext<'_>);

fn set_external_link<S: Slot>(slot: &S, cx: &mut BindContext<'_>) {
    slot.set_href(cx.product.url.as_deref().unwrap_or_default());
}

fn set_image<S: Slot>(slot: &S, cx: &mut BindContext<'_>) {
    if let Some(image) = &cx.product.image {
        if let Some(ticket) = cx.ticket.take() {
            slot.load_image(image, ticket);
        }
    }
}

fn set_title<S: Slot>(slot: &S, cx: &mut BindContext<'_>) {
    slot.set_text(&cx.product.title);
}

fn set_price<S: Slot>(slot: &S, cx: &mut BindContext<'_>) {
    slot.set_text(&cx.money.format_price(&cx.product.price));
}

fn set_compare_at_price<S: Slot>(slot: &S, cx: &mut BindContext<'_>) {
    // Always overwrite so a reused position never keeps a previous discount
    match &cx.product.compare_at_price {
        Some(price) => slot.set_text(&cx.money.format_price(price)),
        None => slot.set_text(""),
    }
}

fn setter_for<S: Slot>(role: BindingRole) -> Setter<S> {
    match role {
        BindingRole::ExternalLink => set_external_link::<S>,
        BindingRole::Image => set_image::<S>,
        BindingRole::Title => set_title::<S>,
        BindingRole::Price => set_price::<S>,
        BindingRole::CompareAtPrice => set_compare_at_price::<S>,
    }
}

/// Role-to-setter table resolved against one template
pub struct BindingDescriptor<I: RenderInstance> {
    setters: Vec<(BindingRole, Setter<I::Slot>)>,
}

impl<I: RenderInstance> BindingDescriptor<I> {
    pub fn resolve<T: Template<Instance = I>>(template: &T) -> Self {
        let setters: Vec<_> = BindingRole::ALL
            .into_iter()
            .filter(|role| template.has_slot(*role))
            .map(|role| (role, setter_for::<I::Slot>(role)))
            .collect();
        tracing::debug!(
            "resolved template bindings: {:?}",
            setters.iter().map(|(role, _)| role).collect::<Vec<_>>()
        );
        Self { setters }
    }

    pub fn roles(&self) -> impl Iterator<Item = BindingRole> + '_ {
        self.setters.iter().map(|(role, _)| *role)
    }

    /// Clone the template and bind `product` into it.
    ///
    /// The instance is `Loading` until `ticket` settles. Items that end up
    /// with no image to wait for settle right away.
    pub fn bind<T: Template<Instance = I>>(
        &self,
        template: &T,
        product: &Product,
        money: &MoneyFormat,
        ticket: SettleTicket,
    ) -> Result<I, GridError> {
        let instance = template.instantiate()?;
        // Before any setter runs: a cached image may settle synchronously
        instance.set_state(ItemState::Loading);

        let ticket = ticket.on_settle({
            let instance = instance.clone();
            move || instance.set_state(ItemState::Ready)
        });
        let mut cx = BindContext {
            product,
            money,
            ticket: Some(ticket),
        };

        for (role, setter) in &self.setters {
            match instance.slot(*role) {
                Some(slot) => setter(&slot, &mut cx),
                None => tracing::trace!("slot {:?} missing from instance, skipped", role),
            }
        }

        if let Some(ticket) = cx.ticket.take() {
            tracing::debug!("item {} has no image to wait for", ticket.index());
            ticket.settle();
        }
        Ok(instance)
    }
}

impl<I: RenderInstance> fmt::Debug for BindingDescriptor<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.roles()).finish()
    }
}
