//! Storefront product page query
//!
//! One GraphQL request per page. The query document and the response shape
//! depend on the configured [`PriceMode`]; both decode into the same
//! [`Product`] record.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{GridConfig, PriceMode, ProductSortKey};
use crate::error::GridError;

// ============================================================================
// Query documents
// ============================================================================

/// First-variant pricing: `priceV2` / `compareAtPriceV2` of `variants(first: 1)`
pub const VARIANT_PRICE_QUERY: &str = r#"
query ProductPage($cursor: String, $perPage: Int!, $query: String!, $scale: Int!, $sortKey: ProductSortKeys!) {
  products(after: $cursor, first: $perPage, query: $query, sortKey: $sortKey) {
    edges {
      cursor
      node {
        ...productFields
      }
    }
    pageInfo {
      hasNextPage
    }
  }
}

fragment productFields on Product {
  onlineStoreUrl
  title
  variants(first: 1) {
    edges {
      node {
        ...variantFields
      }
    }
  }
}

fragment variantFields on ProductVariant {
  compareAtPriceV2 {
    amount
  }
  image {
    altText
    transformedSrc(maxHeight: 512, maxWidth: 512, scale: $scale)
  }
  priceV2 {
    amount
  }
}
"#;

/// Range pricing: `priceRange` / `compareAtPriceRange` across all variants
pub const PRICE_RANGE_QUERY: &str = r#"
query ProductPage($cursor: String, $perPage: Int!, $query: String!, $scale: Int!, $sortKey: ProductSortKeys!) {
  products(after: $cursor, first: $perPage, query: $query, sortKey: $sortKey) {
    edges {
      cursor
      node {
        ...productFields
      }
    }
    pageInfo {
      hasNextPage
    }
  }
}

fragment productFields on Product {
  onlineStoreUrl
  title
  images(first: 1) {
    edges {
      node {
        altText
        transformedSrc(maxHeight: 512, maxWidth: 512, scale: $scale)
      }
    }
  }
  priceRange {
    minVariantPrice {
      amount
    }
    maxVariantPrice {
      amount
    }
  }
  compareAtPriceRange {
    minVariantPrice {
      amount
    }
    maxVariantPrice {
      amount
    }
  }
}
"#;

impl PriceMode {
    pub fn document(&self) -> &'static str {
        match self {
            PriceMode::Variant => VARIANT_PRICE_QUERY,
            PriceMode::Range => PRICE_RANGE_QUERY,
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Image scale requested from the storefront CDN
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scale(u8);

impl Scale {
    /// 2 on high-density displays, otherwise 1
    pub fn for_pixel_ratio(device_pixel_ratio: f64) -> Self {
        if device_pixel_ratio > 1.0 {
            Scale(2)
        } else {
            Scale(1)
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVariables {
    pub cursor: Option<String>,
    pub per_page: u32,
    pub query: String,
    pub scale: u8,
    pub sort_key: ProductSortKey,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphqlRequest {
    pub query: &'static str,
    pub variables: PageVariables,
}

impl GraphqlRequest {
    pub fn page(config: &GridConfig, cursor: Option<&str>, scale: Scale) -> Self {
        Self {
            query: config.price_mode.document(),
            variables: PageVariables {
                cursor: cursor.map(str::to_string),
                per_page: config.per_page,
                query: config.query.clone(),
                scale: scale.get(),
                sort_key: config.sort_key,
            },
        }
    }

    /// JSON request body
    pub fn to_body(&self) -> Result<String, GridError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Item records
// ============================================================================

/// Decimal amount as sent by the storefront
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
}

impl Money {
    pub fn new(amount: impl Into<String>) -> Self {
        Self { amount: amount.into() }
    }

    fn is_zero(&self) -> bool {
        BigDecimal::from_str(self.amount.trim()).is_ok_and(|v| v == BigDecimal::from(0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Price {
    Single(Money),
    Range { min: Money, max: Money },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductImage {
    pub src: String,
    pub alt: String,
}

/// One fetched product, ready for binding
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Product {
    pub title: String,
    /// Online store URL (`None` when the product isn't published to the online store)
    pub url: Option<String>,
    pub image: Option<ProductImage>,
    pub price: Price,
    /// `None` means no discount is shown
    pub compare_at_price: Option<Price>,
}

/// A decoded page: products in server order, with their continuation cursors
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchedPage {
    pub edges: Vec<(String, Product)>,
    pub has_next_page: bool,
}

impl FetchedPage {
    pub fn end_cursor(&self) -> Option<&str> {
        self.edges.last().map(|(cursor, _)| cursor.as_str())
    }
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

#[derive(Deserialize)]
struct ProductsData<N> {
    products: Connection<N>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    edges: Vec<Edge<N>>,
    page_info: PageInfo,
}

#[derive(Deserialize)]
struct Edge<N> {
    cursor: String,
    node: N,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
}

#[derive(Deserialize)]
struct Nodes<N> {
    edges: Vec<NodeEdge<N>>,
}

#[derive(Deserialize)]
struct NodeEdge<N> {
    node: N,
}

impl<N> Nodes<N> {
    fn into_first(self) -> Option<N> {
        self.edges.into_iter().next().map(|e| e.node)
    }
}

#[derive(Deserialize)]
struct MoneyV2 {
    #[serde(deserialize_with = "amount")]
    amount: String,
}

impl From<MoneyV2> for Money {
    fn from(m: MoneyV2) -> Self {
        Money { amount: m.amount }
    }
}

/// Decimal scalars are strings on the wire, but accept plain numbers too
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Amount::deserialize(deserializer)? {
        Amount::Text(s) => s,
        Amount::Number(n) => n.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageFields {
    alt_text: Option<String>,
    transformed_src: String,
}

impl From<ImageFields> for ProductImage {
    fn from(i: ImageFields) -> Self {
        ProductImage {
            src: i.transformed_src,
            alt: i.alt_text.unwrap_or_default(),
        }
    }
}

/// A response node that converts into a [`Product`]
trait ProductNode: for<'de> Deserialize<'de> {
    fn into_product(self) -> Result<Product, GridError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantProductNode {
    online_store_url: Option<String>,
    title: String,
    variants: Nodes<VariantFields>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantFields {
    compare_at_price_v2: Option<MoneyV2>,
    image: Option<ImageFields>,
    price_v2: MoneyV2,
}

impl ProductNode for VariantProductNode {
    fn into_product(self) -> Result<Product, GridError> {
        let title = self.title;
        let variant = self.variants.into_first().ok_or_else(|| {
            GridError::Malformed(format!("product {:?} has no variants", title))
        })?;
        Ok(Product {
            title,
            url: self.online_store_url,
            image: variant.image.map(Into::into),
            price: Price::Single(variant.price_v2.into()),
            compare_at_price: variant.compare_at_price_v2.map(|m| Price::Single(m.into())),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeProductNode {
    online_store_url: Option<String>,
    title: String,
    images: Nodes<ImageFields>,
    price_range: PriceRangeFields,
    compare_at_price_range: Option<PriceRangeFields>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceRangeFields {
    min_variant_price: MoneyV2,
    max_variant_price: MoneyV2,
}

impl From<PriceRangeFields> for Price {
    fn from(r: PriceRangeFields) -> Self {
        Price::Range {
            min: r.min_variant_price.into(),
            max: r.max_variant_price.into(),
        }
    }
}

impl ProductNode for RangeProductNode {
    fn into_product(self) -> Result<Product, GridError> {
        // The storefront reports a zero range for products without a compare-at price
        let compare_at_price = self
            .compare_at_price_range
            .map(Price::from)
            .filter(|p| !matches!(p, Price::Range { max, .. } if max.is_zero()));
        Ok(Product {
            title: self.title,
            url: self.online_store_url,
            image: self.images.into_first().map(Into::into),
            price: self.price_range.into(),
            compare_at_price,
        })
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a raw response body for the given price mode
pub fn decode_page(mode: PriceMode, body: &str) -> Result<FetchedPage, GridError> {
    match mode {
        PriceMode::Variant => decode::<VariantProductNode>(body),
        PriceMode::Range => decode::<RangeProductNode>(body),
    }
}

fn decode<N: ProductNode>(body: &str) -> Result<FetchedPage, GridError> {
    let response: GraphqlResponse<ProductsData<N>> = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        return Err(GridError::Graphql(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    let Some(data) = response.data else {
        return Err(GridError::Malformed("response carried no data".to_string()));
    };

    let connection = data.products;
    let edges = connection
        .edges
        .into_iter()
        .map(|edge| Ok((edge.cursor, edge.node.into_product()?)))
        .collect::<Result<Vec<_>, GridError>>()?;

    Ok(FetchedPage {
        edges,
        has_next_page: connection.page_info.has_next_page,
    })
}
