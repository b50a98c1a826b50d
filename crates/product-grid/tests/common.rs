//! Test utilities for product-grid integration tests
#![allow(dead_code, unused_imports)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use serde_json::{json, Value};
use tracing::Level;

pub use product_grid::{
    BindingRole, GraphqlRequest, GridConfig, GridError, GridLoader, GridState, ItemState,
    LoadOptions, LoadedPage, PriceMode, ProductImage, ProductSortKey, RenderInstance,
    SettleBarrier, SettleTicket, SharedTicket, Slot, Storefront, Surface, Template,
};

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        let level = level.parse::<Level>().unwrap_or(Level::INFO);
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_test_writer()
            .try_init();
    }
}

// ============================================================================
// MockStorefront
// ============================================================================

/// Replays queued response bodies and records every request it receives.
#[derive(Clone, Default)]
pub struct MockStorefront {
    responses: Rc<RefCell<VecDeque<Result<String, GridError>>>>,
    requests: Rc<RefCell<Vec<GraphqlRequest>>>,
}

impl MockStorefront {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, body: String) -> &Self {
        self.responses.borrow_mut().push_back(Ok(body));
        self
    }

    pub fn fail(&self, error: GridError) -> &Self {
        self.responses.borrow_mut().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<GraphqlRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_request(&self) -> GraphqlRequest {
        self.requests
            .borrow()
            .last()
            .cloned()
            .expect("no request was issued")
    }
}

impl Storefront for MockStorefront {
    async fn execute(&self, request: &GraphqlRequest) -> Result<String, GridError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(GridError::Transport("no response queued".to_string())))
    }
}

// ============================================================================
// MockTemplate / MockItem
// ============================================================================

/// Template with a configurable set of binding slots.
#[derive(Clone)]
pub struct MockTemplate {
    roles: HashSet<BindingRole>,
    /// Text the template markup already carries in a slot
    placeholders: HashMap<BindingRole, String>,
    /// Images settle while being assigned, as a browser cache hit might
    cached_images: bool,
    /// Zero-based instantiation that fails, counted across pages
    fail_at: Option<usize>,
    next_id: Rc<Cell<usize>>,
}

impl MockTemplate {
    /// Template carrying every binding role
    pub fn full() -> Self {
        Self::with_roles(&BindingRole::ALL)
    }

    pub fn with_roles(roles: &[BindingRole]) -> Self {
        Self {
            roles: roles.iter().copied().collect(),
            placeholders: HashMap::new(),
            cached_images: false,
            fail_at: None,
            next_id: Rc::new(Cell::new(0)),
        }
    }

    pub fn placeholder(mut self, role: BindingRole, text: &str) -> Self {
        self.placeholders.insert(role, text.to_string());
        self
    }

    pub fn cached_images(mut self) -> Self {
        self.cached_images = true;
        self
    }

    /// Fail the `n`th instantiation (zero-based), as a DOM clone can
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn instantiated(&self) -> usize {
        self.next_id.get()
    }
}

impl Template for MockTemplate {
    type Instance = MockItem;

    fn instantiate(&self) -> Result<MockItem, GridError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        if self.fail_at == Some(id) {
            return Err(GridError::Template(format!("clone {} failed", id)));
        }
        Ok(MockItem(Rc::new(ItemData {
            id,
            roles: self.roles.clone(),
            cached_images: self.cached_images,
            href: RefCell::new(None),
            texts: RefCell::new(self.placeholders.clone()),
            image: RefCell::new(None),
            pending: RefCell::new(None),
            events: RefCell::new(Vec::new()),
            states: RefCell::new(Vec::new()),
        })))
    }

    fn has_slot(&self, role: BindingRole) -> bool {
        self.roles.contains(&role)
    }
}

pub struct ItemData {
    pub id: usize,
    roles: HashSet<BindingRole>,
    cached_images: bool,
    href: RefCell<Option<String>>,
    texts: RefCell<HashMap<BindingRole, String>>,
    image: RefCell<Option<ProductImage>>,
    pending: RefCell<Option<SharedTicket>>,
    events: RefCell<Vec<ImageEvent>>,
    states: RefCell<Vec<ItemState>>,
}

/// Events an image element can report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageEvent {
    Load,
    Error,
}

/// A cloned template. Clones share the same underlying item.
#[derive(Clone)]
pub struct MockItem(pub Rc<ItemData>);

impl MockItem {
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn text(&self, role: BindingRole) -> Option<String> {
        self.0.texts.borrow().get(&role).cloned()
    }

    pub fn title(&self) -> Option<String> {
        self.text(BindingRole::Title)
    }

    pub fn href(&self) -> Option<String> {
        self.0.href.borrow().clone()
    }

    pub fn image(&self) -> Option<ProductImage> {
        self.0.image.borrow().clone()
    }

    pub fn state(&self) -> Option<ItemState> {
        self.0.states.borrow().last().copied()
    }

    pub fn state_history(&self) -> Vec<ItemState> {
        self.0.states.borrow().clone()
    }

    pub fn is_image_pending(&self) -> bool {
        self.0
            .pending
            .borrow()
            .as_ref()
            .is_some_and(SharedTicket::is_pending)
    }

    /// Fire the image `load` event. Returns whether it settled the item.
    pub fn load_image(&self) -> bool {
        self.fire(ImageEvent::Load)
    }

    /// Fire the image `error` event. Returns whether it settled the item.
    pub fn fail_image(&self) -> bool {
        self.fire(ImageEvent::Error)
    }

    /// Events fired at this item's image so far
    pub fn image_events(&self) -> Vec<ImageEvent> {
        self.0.events.borrow().clone()
    }

    /// Both listeners share one ticket, as on a real image element
    fn fire(&self, event: ImageEvent) -> bool {
        self.0.events.borrow_mut().push(event);
        let listener = self.0.pending.borrow().clone();
        listener.is_some_and(|ticket| ticket.settle())
    }

    /// Forget the pending image without settling it
    pub fn drop_image(&self) {
        self.0.pending.borrow_mut().take();
    }
}

impl RenderInstance for MockItem {
    type Slot = MockSlot;

    fn slot(&self, role: BindingRole) -> Option<MockSlot> {
        self.0.roles.contains(&role).then(|| MockSlot {
            item: self.clone(),
            role,
        })
    }

    fn set_state(&self, state: ItemState) {
        self.0.states.borrow_mut().push(state);
    }
}

pub struct MockSlot {
    item: MockItem,
    role: BindingRole,
}

impl Slot for MockSlot {
    fn set_href(&self, href: &str) {
        *self.item.0.href.borrow_mut() = Some(href.to_string());
    }

    fn set_text(&self, text: &str) {
        self.item.0.texts.borrow_mut().insert(self.role, text.to_string());
    }

    fn load_image(&self, image: &ProductImage, ticket: SettleTicket) {
        *self.item.0.image.borrow_mut() = Some(image.clone());
        if self.item.0.cached_images {
            ticket.settle();
        } else {
            *self.item.0.pending.borrow_mut() = Some(SharedTicket::new(ticket));
        }
    }
}

// ============================================================================
// MockSurface
// ============================================================================

#[derive(Default)]
pub struct SurfaceData {
    items: RefCell<Vec<MockItem>>,
    states: RefCell<Vec<GridState>>,
    clears: Cell<usize>,
}

#[derive(Clone, Default)]
pub struct MockSurface(pub Rc<SurfaceData>);

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<MockItem> {
        self.0.items.borrow().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.items().iter().filter_map(|i| i.title()).collect()
    }

    pub fn state(&self) -> GridState {
        self.0.states.borrow().last().copied().unwrap_or_default()
    }

    pub fn state_history(&self) -> Vec<GridState> {
        self.0.states.borrow().clone()
    }

    /// Number of times the surface was marked ready
    pub fn ready_count(&self) -> usize {
        self.0
            .states
            .borrow()
            .iter()
            .filter(|s| **s == GridState::Ready)
            .count()
    }

    pub fn clears(&self) -> usize {
        self.0.clears.get()
    }
}

impl Surface for MockSurface {
    type Instance = MockItem;

    fn clear(&self) {
        self.0.items.borrow_mut().clear();
        self.0.clears.set(self.0.clears.get() + 1);
    }

    fn append(&self, instance: &MockItem) {
        self.0.items.borrow_mut().push(instance.clone());
    }

    fn set_state(&self, state: GridState) {
        self.0.states.borrow_mut().push(state);
    }
}

pub type MockLoader = GridLoader<MockStorefront, MockTemplate, MockSurface>;

/// Loader with a full template and default config, plus handles to its mocks
pub fn setup() -> (MockLoader, MockStorefront, MockSurface) {
    setup_with(MockTemplate::full(), GridConfig::default())
}

pub fn setup_with(
    template: MockTemplate,
    config: GridConfig,
) -> (MockLoader, MockStorefront, MockSurface) {
    let storefront = MockStorefront::new();
    let surface = MockSurface::new();
    let loader = GridLoader::new(storefront.clone(), template, surface.clone(), config)
        .expect("test config is valid");
    (loader, storefront, surface)
}

// ============================================================================
// Response builders
// ============================================================================

/// One product as the storefront would return it
#[derive(Clone, Debug)]
pub struct Fixture {
    pub cursor: String,
    pub title: String,
    pub url: Option<String>,
    pub price: String,
    pub compare_at: Option<String>,
    pub image: Option<(String, String)>,
}

/// Product `n` with a cursor, a price and an image
pub fn fixture(n: usize) -> Fixture {
    Fixture {
        cursor: format!("cursor-{}", n),
        title: format!("Product {}", n),
        url: Some(format!("https://shop.example/products/{}", n)),
        price: format!("{}.50", 10 + n),
        compare_at: None,
        image: Some((
            format!("https://cdn.example/{}.jpg", n),
            format!("Photo of product {}", n),
        )),
    }
}

impl Fixture {
    pub fn compare_at(mut self, amount: &str) -> Self {
        self.compare_at = Some(amount.to_string());
        self
    }

    pub fn price(mut self, amount: &str) -> Self {
        self.price = amount.to_string();
        self
    }

    pub fn without_image(mut self) -> Self {
        self.image = None;
        self
    }

    fn image_json(&self) -> Value {
        match &self.image {
            Some((src, alt)) => json!({ "altText": alt, "transformedSrc": src }),
            None => Value::Null,
        }
    }

    fn variant_node(&self) -> Value {
        json!({
            "onlineStoreUrl": self.url,
            "title": self.title,
            "variants": {
                "edges": [{
                    "node": {
                        "compareAtPriceV2": self
                            .compare_at
                            .as_ref()
                            .map(|a| json!({ "amount": a })),
                        "image": self.image_json(),
                        "priceV2": { "amount": self.price },
                    }
                }]
            }
        })
    }

    fn range_node(&self, max_price: &str) -> Value {
        let images = match self.image_json() {
            Value::Null => json!({ "edges": [] }),
            image => json!({ "edges": [{ "node": image }] }),
        };
        let compare_at = self.compare_at.as_deref().unwrap_or("0.0");
        json!({
            "onlineStoreUrl": self.url,
            "title": self.title,
            "images": images,
            "priceRange": {
                "minVariantPrice": { "amount": self.price },
                "maxVariantPrice": { "amount": max_price },
            },
            "compareAtPriceRange": {
                "minVariantPrice": { "amount": compare_at },
                "maxVariantPrice": { "amount": compare_at },
            }
        })
    }
}

fn page_body(edges: Vec<Value>, has_next_page: bool) -> String {
    json!({
        "data": {
            "products": {
                "edges": edges,
                "pageInfo": { "hasNextPage": has_next_page }
            }
        }
    })
    .to_string()
}

/// Response body in the first-variant price shape
pub fn variant_page(fixtures: &[Fixture], has_next_page: bool) -> String {
    let edges = fixtures
        .iter()
        .map(|f| json!({ "cursor": f.cursor, "node": f.variant_node() }))
        .collect();
    page_body(edges, has_next_page)
}

/// Response body in the price range shape; each entry carries its max price
pub fn range_page(fixtures: &[(Fixture, &str)], has_next_page: bool) -> String {
    let edges = fixtures
        .iter()
        .map(|(f, max)| json!({ "cursor": f.cursor, "node": f.range_node(max) }))
        .collect();
    page_body(edges, has_next_page)
}

pub fn fixtures(range: std::ops::Range<usize>) -> Vec<Fixture> {
    range.map(fixture).collect()
}

/// Settle every pending image on `items` by firing `load`
pub fn load_all(items: &[MockItem]) {
    for item in items {
        item.load_image();
    }
}
