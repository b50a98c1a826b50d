//! Product Grid - paginated storefront product loader
//!
//! [`GridLoader`] fetches one page of products per call, binds each product
//! into a clone of a template and reports when every item's image has
//! settled. Rendering, transport and templates are supplied by the platform
//! through the [`Storefront`], [`Surface`] and [`Template`] traits.

pub mod binding;
pub mod config;
pub mod error;
pub mod format;
pub mod query;
pub mod settle;

use std::cell::Cell;
use std::rc::Rc;

use ankurah_signals::{Mut, Peek, Read};

pub use binding::{BindingDescriptor, BindingRole, ItemState, RenderInstance, Slot, Template};
pub use config::{GridConfig, PriceMode, ProductSortKey, StorefrontConfig};
pub use error::GridError;
pub use format::MoneyFormat;
pub use query::{GraphqlRequest, Money, Price, Product, ProductImage, Scale};
pub use settle::{ReadySignal, SettleBarrier, SettleTicket, SharedTicket};
pub use ankurah_signals;

// ============================================================================
// Platform traits
// ============================================================================

/// Executes one storefront GraphQL request and returns the raw response body.
///
/// Implementations must not retry; a failure is reported once to the caller.
#[allow(async_fn_in_trait)]
pub trait Storefront {
    async fn execute(&self, request: &GraphqlRequest) -> Result<String, GridError>;
}

/// The element items are rendered into. Mutated only by the loader.
pub trait Surface: Clone + 'static {
    type Instance: RenderInstance;

    /// Remove all rendered items
    fn clear(&self);

    fn append(&self, instance: &Self::Instance);

    fn set_state(&self, state: GridState);
}

// ============================================================================
// Core Types
// ============================================================================

/// Surface-wide loading state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GridState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// A page is being fetched, or its images are still settling
    Loading,
    /// The current page and all of its images are in place
    Ready,
}

impl GridState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridState::Idle => "idle",
            GridState::Loading => "loading",
            GridState::Ready => "ready",
        }
    }
}

/// How a page load treats the existing content
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Keep previously rendered items (`false` clears the surface first)
    pub append: bool,
    /// Attach bound items to the surface (`false` only binds them)
    pub render: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            append: true,
            render: true,
        }
    }
}

/// Pagination cursor state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageState {
    /// Continuation token of the last item received
    pub cursor: Option<String>,
    pub has_next_page: bool,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            cursor: None,
            has_next_page: true,
        }
    }
}

/// A bound page. Holding one means content is bound; [`LoadedPage::ready`]
/// waits for the images.
pub struct LoadedPage<I> {
    products: Vec<Product>,
    instances: Vec<I>,
    ready: ReadySignal,
}

impl<I> LoadedPage<I> {
    fn empty() -> Self {
        let (_, ready) = SettleBarrier::arm(0, || {});
        Self {
            products: Vec::new(),
            instances: Vec::new(),
            ready,
        }
    }

    /// Products in server order
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Rendered items, in the same order as [`products`](Self::products)
    pub fn instances(&self) -> &[I] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Progress of this page's images
    pub fn settle_progress(&self) -> (usize, usize) {
        (self.ready.settled(), self.ready.expected())
    }

    /// Resolve with the rendered items once every image has loaded or failed
    pub async fn ready(self) -> Result<Vec<I>, GridError> {
        self.ready.wait().await?;
        Ok(self.instances)
    }
}

// ============================================================================
// GridLoader
// ============================================================================

/// Incremental product grid loader
///
/// At most one load can be in flight: every load borrows the loader mutably.
pub struct GridLoader<C, T, S>
where
    C: Storefront,
    T: Template,
    S: Surface<Instance = T::Instance>,
{
    storefront: C,
    template: T,
    surface: S,
    descriptor: BindingDescriptor<T::Instance>,
    config: GridConfig,
    page: PageState,
    pixel_ratio: f64,
    current_page: Vec<T::Instance>,
    state: Mut<GridState>,
    /// Bumped per request; completion hooks of older pages check it
    generation: Rc<Cell<u64>>,
}

impl<C, T, S> GridLoader<C, T, S>
where
    C: Storefront,
    T: Template,
    S: Surface<Instance = T::Instance>,
{
    /// Create a loader. Bindings are resolved against `template` here, once.
    ///
    /// Fails with [`GridError::Config`] if `config` does not validate.
    pub fn new(
        storefront: C,
        template: T,
        surface: S,
        config: GridConfig,
    ) -> Result<Self, GridError> {
        config.validate()?;
        let descriptor = BindingDescriptor::resolve(&template);
        Ok(Self {
            storefront,
            template,
            surface,
            descriptor,
            config,
            page: PageState::default(),
            pixel_ratio: 1.0,
            current_page: Vec::new(),
            state: Mut::new(GridState::Idle),
            generation: Rc::new(Cell::new(0)),
        })
    }

    // Accessors
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn cursor(&self) -> Option<&str> {
        self.page.cursor.as_deref()
    }

    pub fn has_next_page(&self) -> bool {
        self.page.has_next_page
    }

    pub fn page_state(&self) -> &PageState {
        &self.page
    }

    /// Items of the most recent non-empty page
    pub fn current_page(&self) -> &[T::Instance] {
        &self.current_page
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn state(&self) -> Read<GridState> {
        self.state.read()
    }

    pub fn current_state(&self) -> GridState {
        self.state.peek()
    }

    /// Device pixel ratio used to pick the image scale of the next request
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.pixel_ratio = pixel_ratio;
    }

    /// Start over from the first page, replacing rendered content
    pub async fn init(&mut self) -> Result<LoadedPage<T::Instance>, GridError> {
        self.load_page(true).await
    }

    /// Load the page after the stored cursor, appending to rendered content
    pub async fn next(&mut self) -> Result<LoadedPage<T::Instance>, GridError> {
        self.load_page(false).await
    }

    /// Load one page.
    ///
    /// `reset` clears the cursor and replaces rendered content; otherwise the
    /// page continues from the stored cursor and is appended.
    pub async fn load_page(&mut self, reset: bool) -> Result<LoadedPage<T::Instance>, GridError> {
        let options = LoadOptions {
            append: !reset,
            render: true,
        };
        self.load_page_with(reset, options).await
    }

    /// Load one page with explicit append/render handling.
    ///
    /// A page either succeeds as a whole or leaves the cursor, `has_next_page`
    /// and the current page as they were.
    pub async fn load_page_with(
        &mut self,
        reset: bool,
        options: LoadOptions,
    ) -> Result<LoadedPage<T::Instance>, GridError> {
        if !reset && !self.page.has_next_page {
            tracing::debug!("load_page: no further pages, skipping request");
            return Ok(LoadedPage::empty());
        }
        // Page state is only written once the page has been fetched and bound
        let cursor = if reset { None } else { self.page.cursor.clone() };

        // From here on, hooks of earlier pages no longer touch the surface state
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        if !options.append {
            self.surface.clear();
        }
        self.set_state(GridState::Loading);

        let scale = Scale::for_pixel_ratio(self.pixel_ratio);
        let request = GraphqlRequest::page(&self.config, cursor.as_deref(), scale);
        tracing::debug!(
            "load_page: reset={}, cursor={:?}, per_page={}, scale={}",
            reset,
            cursor,
            self.config.per_page,
            scale.get()
        );

        // Failures leave the surface in Loading and the page state untouched
        let body = self.storefront.execute(&request).await?;
        let fetched = query::decode_page(self.config.price_mode, &body)?;

        // An empty page (possibly the very first) leaves the cursor alone
        let Some(end_cursor) = fetched.end_cursor().map(str::to_string) else {
            tracing::debug!("load_page: empty page");
            if reset {
                self.page = PageState::default();
                self.current_page.clear();
            }
            self.set_state(GridState::Ready);
            return Ok(LoadedPage::empty());
        };
        let has_next_page = fetched.has_next_page;

        let products: Vec<Product> = fetched
            .edges
            .into_iter()
            .map(|(_, product)| product)
            .collect();
        let (tickets, ready) = SettleBarrier::arm(products.len(), {
            let surface = self.surface.clone();
            let state = self.state.clone();
            let current = self.generation.clone();
            move || {
                if current.get() != generation {
                    tracing::debug!("images of superseded page {} settled, ignoring", generation);
                    return;
                }
                surface.set_state(GridState::Ready);
                state.set(GridState::Ready);
            }
        });

        let instances: Vec<T::Instance> = products
            .iter()
            .zip(tickets)
            .map(|(product, ticket)| {
                self.descriptor
                    .bind(&self.template, product, &self.config.money, ticket)
            })
            .collect::<Result<Vec<_>, GridError>>()?;

        self.page = PageState {
            cursor: Some(end_cursor),
            has_next_page,
        };

        if options.render {
            for instance in &instances {
                self.surface.append(instance);
            }
        }
        self.current_page = instances.clone();

        tracing::info!(
            "bound page {} with {} products (has_next_page={})",
            generation,
            instances.len(),
            self.page.has_next_page
        );

        Ok(LoadedPage {
            products,
            instances,
            ready,
        })
    }

    fn set_state(&self, state: GridState) {
        self.surface.set_state(state);
        self.state.set(state);
    }
}
