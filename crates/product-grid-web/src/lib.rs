//! Browser bindings for product-grid
//!
//! Wires the platform-agnostic [`GridLoader`] to the DOM and the `fetch` API
//! and exposes it to JavaScript as `ProductGrid`.
//!
//! ```html
//! <div id="grid" data-per-page="12" data-sort-key="TITLE">
//!   <a data-bind="product-external-link">
//!     <span data-bind="product-image"></span>
//!     <h3 data-bind="product-title"></h3>
//!     <span data-bind="product-price"></span>
//!     <s data-bind="product-compare-at-price"></s>
//!   </a>
//! </div>
//! ```

mod dom;
mod fetch;

use std::cell::RefCell;
use std::panic;
use std::rc::Rc;

use js_sys::Array;
use product_grid::ankurah_signals::{Get, Read};
use product_grid::{
    GridConfig, GridError, GridLoader, GridState, LoadOptions, LoadedPage, PageState,
    StorefrontConfig,
};
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

pub use dom::{DomInstance, DomSlot, DomSurface, DomTemplate};
pub use fetch::FetchStorefront;

pub type DomLoader = GridLoader<FetchStorefront, DomTemplate, DomSurface>;

fn to_js(error: GridError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

#[wasm_bindgen(start)]
pub fn start() {
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::INFO)
            .build(),
    );
    panic::set_hook(Box::new(console_error_panic_hook::hook));
}

// ============================================================================
// BoundPage
// ============================================================================

/// One loaded page. Items are bound when this is returned; `ready()` waits for
/// their images.
#[wasm_bindgen]
pub struct BoundPage {
    items: Array,
    page: RefCell<Option<LoadedPage<DomInstance>>>,
}

impl BoundPage {
    fn new(page: LoadedPage<DomInstance>) -> Self {
        let items = page
            .instances()
            .iter()
            .map(|i| JsValue::from(i.element().clone()))
            .collect();
        Self {
            items,
            page: RefCell::new(Some(page)),
        }
    }
}

#[wasm_bindgen]
impl BoundPage {
    /// The item elements, in server order
    #[wasm_bindgen(getter)]
    pub fn items(&self) -> Array {
        self.items.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> u32 {
        self.items.length()
    }

    /// Number of items whose image has loaded or failed
    #[wasm_bindgen(getter)]
    pub fn settled(&self) -> u32 {
        match self.page.borrow().as_ref() {
            Some(page) => page.settle_progress().0 as u32,
            None => self.items.length(),
        }
    }

    /// Resolves with the item elements once every image has settled.
    pub async fn ready(&self) -> Result<Array, JsValue> {
        let page = self.page.borrow_mut().take();
        if let Some(page) = page {
            page.ready().await.map_err(to_js)?;
        }
        Ok(self.items.clone())
    }
}

// ============================================================================
// ProductGrid
// ============================================================================

/// Product grid bound to one element.
///
/// The element's first child is used as the item template. Configuration is
/// read from its `data-*` attributes.
#[wasm_bindgen]
pub struct ProductGrid {
    loader: Rc<RefCell<DomLoader>>,
    /// Copy of the loader's cursor state, readable while a load is running
    page: Rc<RefCell<PageState>>,
    state: Read<GridState>,
}

#[wasm_bindgen]
impl ProductGrid {
    /// # Arguments
    /// * `grid` - Element the products are rendered into
    /// * `domain` - The shop's storefront domain
    /// * `access_token` - Storefront API access token
    #[wasm_bindgen(constructor)]
    pub fn new(
        grid: HtmlElement,
        domain: String,
        access_token: String,
    ) -> Result<ProductGrid, JsValue> {
        let dataset = grid.dataset();
        let config = GridConfig::from_dataset(|key: &str| dataset.get(key)).map_err(to_js)?;

        let mut storefront = StorefrontConfig::new(domain, access_token);
        if let Some(api_version) = dataset.get("apiVersion") {
            storefront = storefront.with_api_version(api_version);
        }

        let template = DomTemplate::from_grid(&grid)
            .ok_or_else(|| JsValue::from_str("product grid has no item template"))?;

        let loader = GridLoader::new(
            FetchStorefront::new(storefront),
            template,
            DomSurface::new(grid),
            config,
        )
        .map_err(to_js)?;
        let state = loader.state();
        let page = Rc::new(RefCell::new(loader.page_state().clone()));

        Ok(Self {
            loader: Rc::new(RefCell::new(loader)),
            page,
            state,
        })
    }

    /// Load the first page, replacing the grid's content. Resolves with the
    /// item elements once their images have settled.
    pub async fn init(&self) -> Result<Array, JsValue> {
        let options = LoadOptions {
            append: false,
            render: true,
        };
        let page = self.load(true, options).await?;
        page.ready().await
    }

    /// Load the page after the current cursor.
    ///
    /// Resolves with the items once their images have settled. Resolves with
    /// no items when the last page has already been loaded.
    pub async fn next(
        &self,
        append: Option<bool>,
        render: Option<bool>,
    ) -> Result<Array, JsValue> {
        let options = LoadOptions {
            append: append.unwrap_or(true),
            render: render.unwrap_or(true),
        };
        let page = self.load(false, options).await?;
        page.ready().await
    }

    /// Load one page and resolve as soon as its items are bound.
    #[wasm_bindgen(js_name = loadPage)]
    pub async fn load_page(&self, reset: bool) -> Result<BoundPage, JsValue> {
        let options = LoadOptions {
            append: !reset,
            render: true,
        };
        self.load(reset, options).await
    }

    #[wasm_bindgen(getter, js_name = hasNextPage)]
    pub fn has_next_page(&self) -> bool {
        self.page.borrow().has_next_page
    }

    #[wasm_bindgen(getter)]
    pub fn cursor(&self) -> Option<String> {
        self.page.borrow().cursor.clone()
    }

    /// `"idle"`, `"loading"` or `"ready"`
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.state.get().as_str().to_string()
    }
}

impl ProductGrid {
    #[allow(clippy::await_holding_refcell_ref)]
    async fn load(&self, reset: bool, options: LoadOptions) -> Result<BoundPage, JsValue> {
        let mut loader = self
            .loader
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("a page load is already in progress"))?;

        if let Some(window) = web_sys::window() {
            loader.set_pixel_ratio(window.device_pixel_ratio());
        }

        let result = loader.load_page_with(reset, options).await;
        *self.page.borrow_mut() = loader.page_state().clone();
        if let Err(e) = &result {
            tracing::error!("product grid load failed: {}", e);
        }
        Ok(BoundPage::new(result.map_err(to_js)?))
    }
}
