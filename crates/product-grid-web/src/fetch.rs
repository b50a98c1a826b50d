//! Storefront transport over the browser `fetch` API

use product_grid::{GraphqlRequest, GridError, Storefront, StorefrontConfig};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

fn transport_error(value: JsValue) -> GridError {
    GridError::Transport(
        value
            .as_string()
            .unwrap_or_else(|| format!("{:?}", value)),
    )
}

pub struct FetchStorefront {
    config: StorefrontConfig,
}

impl FetchStorefront {
    pub fn new(config: StorefrontConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }
}

impl Storefront for FetchStorefront {
    async fn execute(&self, request: &GraphqlRequest) -> Result<String, GridError> {
        let window = web_sys::window()
            .ok_or_else(|| GridError::Transport("no window available".to_string()))?;

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&JsValue::from_str(&request.to_body()?));

        let fetch_request = Request::new_with_str_and_init(&self.config.endpoint(), &init)
            .map_err(transport_error)?;
        let headers = fetch_request.headers();
        for (name, value) in self.config.headers() {
            headers.set(name, value).map_err(transport_error)?;
        }

        let response: Response = JsFuture::from(window.fetch_with_request(&fetch_request))
            .await
            .map_err(transport_error)?
            .dyn_into()
            .map_err(transport_error)?;

        if !response.ok() {
            return Err(GridError::Http {
                status: response.status(),
            });
        }

        let body = JsFuture::from(response.text().map_err(transport_error)?)
            .await
            .map_err(transport_error)?;
        body.as_string()
            .ok_or_else(|| GridError::Transport("response body is not text".to_string()))
    }
}
