//! DOM implementations of the template, slot and surface traits
//!
//! Slots are found with `[data-bind="<role token>"]`; item and grid states are
//! written to `data-state`.

use product_grid::{
    BindingRole, GridError, GridState, ItemState, ProductImage, RenderInstance, SettleTicket,
    SharedTicket, Slot, Surface, Template,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, HtmlElement, HtmlImageElement};

fn find_slot(root: &Element, role: BindingRole) -> Option<Element> {
    let selector = format!("[data-bind=\"{}\"]", role.token());
    match root.query_selector(&selector) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("slot lookup for {:?} failed: {:?}", role, e);
            None
        }
    }
}

// ============================================================================
// Template
// ============================================================================

/// The item markup every product is cloned from
#[derive(Clone)]
pub struct DomTemplate {
    element: Element,
}

impl DomTemplate {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    /// Use the grid's first child element. Keep the template before the grid is cleared.
    pub fn from_grid(grid: &HtmlElement) -> Option<Self> {
        grid.first_element_child().map(Self::new)
    }
}

impl Template for DomTemplate {
    type Instance = DomInstance;

    fn instantiate(&self) -> Result<DomInstance, GridError> {
        let node = self
            .element
            .clone_node_with_deep(true)
            .map_err(|e| GridError::Template(format!("{:?}", e)))?;
        let element = node
            .dyn_into::<Element>()
            .map_err(|_| GridError::Template("template clone is not an element".to_string()))?;
        Ok(DomInstance { element })
    }

    fn has_slot(&self, role: BindingRole) -> bool {
        find_slot(&self.element, role).is_some()
    }
}

// ============================================================================
// Instance / Slot
// ============================================================================

#[derive(Clone)]
pub struct DomInstance {
    element: Element,
}

impl DomInstance {
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl RenderInstance for DomInstance {
    type Slot = DomSlot;

    fn slot(&self, role: BindingRole) -> Option<DomSlot> {
        find_slot(&self.element, role).map(DomSlot)
    }

    fn set_state(&self, state: ItemState) {
        if let Err(e) = self.element.set_attribute("data-state", state.as_str()) {
            tracing::warn!("failed to set item state: {:?}", e);
        }
    }
}

pub struct DomSlot(Element);

impl Slot for DomSlot {
    fn set_href(&self, href: &str) {
        if let Err(e) = self.0.set_attribute("href", href) {
            tracing::warn!("failed to set link: {:?}", e);
        }
    }

    fn set_text(&self, text: &str) {
        self.0.set_text_content(Some(text));
    }

    fn load_image(&self, image: &ProductImage, ticket: SettleTicket) {
        let img = match HtmlImageElement::new() {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("could not create image element: {:?}", e);
                ticket.settle();
                return;
            }
        };

        // Shared by the load and error listeners; whichever fires first settles
        let ticket = SharedTicket::new(ticket);
        let listener = Closure::<dyn FnMut(Event)>::new({
            let ticket = ticket.clone();
            move |_event: Event| {
                ticket.settle();
            }
        });

        // Listeners go on before src so a cache hit can't be missed
        for event in ["load", "error"] {
            let added = img.add_event_listener_with_callback(
                event,
                listener.as_ref().unchecked_ref(),
            );
            if let Err(e) = added {
                tracing::warn!("could not listen for image {}: {:?}", event, e);
                ticket.settle();
            }
        }
        // Owned by the image element from here on
        listener.forget();

        img.set_alt(&image.alt);
        img.set_src(&image.src);

        if let Err(e) = self.0.replace_with_with_node_1(&img) {
            tracing::warn!("could not replace image placeholder: {:?}", e);
        }
    }
}

// ============================================================================
// Surface
// ============================================================================

/// The grid element
#[derive(Clone)]
pub struct DomSurface {
    grid: HtmlElement,
}

impl DomSurface {
    pub fn new(grid: HtmlElement) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &HtmlElement {
        &self.grid
    }
}

impl Surface for DomSurface {
    type Instance = DomInstance;

    fn clear(&self) {
        self.grid.set_inner_html("");
    }

    fn append(&self, instance: &DomInstance) {
        if let Err(e) = self.grid.append_child(instance.element()) {
            tracing::warn!("failed to append item: {:?}", e);
        }
    }

    fn set_state(&self, state: GridState) {
        if let Err(e) = self.grid.dataset().set("state", state.as_str()) {
            tracing::warn!("failed to set grid state: {:?}", e);
        }
    }
}
