//! Grid and storefront configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::format::MoneyFormat;

/// Default page size. Divides into complete rows of 6, 4, 3 and 2 columns.
pub const DEFAULT_PER_PAGE: u32 = 24;

pub const DEFAULT_API_VERSION: &str = "2020-01";

/// Storefront API access, passed explicitly to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorefrontConfig {
    /// The shop's `*.myshopify.com` domain
    pub domain: String,
    pub access_token: String,
    pub api_version: String,
}

impl StorefrontConfig {
    pub fn new(domain: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// GraphQL endpoint for this shop
    pub fn endpoint(&self) -> String {
        format!("https://{}/api/{}/graphql", self.domain, self.api_version)
    }

    /// Headers every storefront request must carry
    pub fn headers(&self) -> [(&'static str, &str); 3] {
        [
            ("Accept", "application/json"),
            ("Content-Type", "application/json"),
            ("X-Shopify-Storefront-Access-Token", self.access_token.as_str()),
        ]
    }
}

/// Sort keys accepted by the storefront `products` connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductSortKey {
    Title,
    ProductType,
    Vendor,
    UpdatedAt,
    CreatedAt,
    BestSelling,
    Price,
    #[default]
    Id,
    Relevance,
}

impl ProductSortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductSortKey::Title => "TITLE",
            ProductSortKey::ProductType => "PRODUCT_TYPE",
            ProductSortKey::Vendor => "VENDOR",
            ProductSortKey::UpdatedAt => "UPDATED_AT",
            ProductSortKey::CreatedAt => "CREATED_AT",
            ProductSortKey::BestSelling => "BEST_SELLING",
            ProductSortKey::Price => "PRICE",
            ProductSortKey::Id => "ID",
            ProductSortKey::Relevance => "RELEVANCE",
        }
    }
}

impl FromStr for ProductSortKey {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim() {
            "TITLE" => ProductSortKey::Title,
            "PRODUCT_TYPE" => ProductSortKey::ProductType,
            "VENDOR" => ProductSortKey::Vendor,
            "UPDATED_AT" => ProductSortKey::UpdatedAt,
            "CREATED_AT" => ProductSortKey::CreatedAt,
            "BEST_SELLING" => ProductSortKey::BestSelling,
            "PRICE" => ProductSortKey::Price,
            "ID" => ProductSortKey::Id,
            "RELEVANCE" => ProductSortKey::Relevance,
            other => return Err(GridError::Config(format!("unknown sort key {:?}", other))),
        };
        Ok(key)
    }
}

impl fmt::Display for ProductSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which price shape the query requests and the response carries.
///
/// - `Variant`: price and compare-at price of the first variant
/// - `Range`: min/max price across all variants
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriceMode {
    #[default]
    Variant,
    Range,
}

impl FromStr for PriceMode {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "variant" => Ok(PriceMode::Variant),
            "range" => Ok(PriceMode::Range),
            other => Err(GridError::Config(format!("unknown price mode {:?}", other))),
        }
    }
}

/// Per-grid settings
#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig {
    pub per_page: u32,
    /// Free-text storefront search filter
    pub query: String,
    pub sort_key: ProductSortKey,
    pub price_mode: PriceMode,
    pub money: MoneyFormat,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            query: String::new(),
            sort_key: ProductSortKey::default(),
            price_mode: PriceMode::default(),
            money: MoneyFormat::default(),
        }
    }
}

impl GridConfig {
    /// Build a config from markup attributes (`data-per-page`, `data-query`,
    /// `data-sort-key`, `data-price-mode`), looked up by their camelCase
    /// dataset keys. Missing keys keep their defaults.
    pub fn from_dataset(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GridError> {
        let mut config = GridConfig::default();

        if let Some(per_page) = lookup("perPage") {
            config.per_page = per_page
                .trim()
                .parse()
                .map_err(|_| {
                    GridError::Config(format!("perPage is not a number: {:?}", per_page))
                })?;
        }
        if let Some(query) = lookup("query") {
            config.query = query;
        }
        if let Some(sort_key) = lookup("sortKey") {
            config.sort_key = sort_key.parse()?;
        }
        if let Some(price_mode) = lookup("priceMode") {
            config.price_mode = price_mode.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.per_page == 0 {
            return Err(GridError::Config("perPage must be positive".to_string()));
        }
        Ok(())
    }
}
