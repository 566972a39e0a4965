use chrono::NaiveDate;
use serde::Deserialize;

use orderflow_core::ProductId;
use orderflow_coupons::CouponKind;
use orderflow_inventory::StockDirection;

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartLineRequest {
    pub quantity: i64,
}

/// Body of preview/finalize; the whole body is optional.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub coupon_code: Option<String>,
}

impl CheckoutRequest {
    /// Parse a raw preview/finalize body.
    ///
    /// A missing or blank body means no coupon. Anything else must be a JSON
    /// object sent with a JSON content type.
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Result<Self, String> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match content_type {
            Some(ct) if is_json_content_type(ct) => {}
            _ => return Err("checkout body must be sent as application/json".to_string()),
        }
        serde_json::from_slice(body).map_err(|e| format!("invalid checkout body: {e}"))
    }

    /// Coupon code, with blank input treated as no code.
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub quantity: i64,
    pub direction: StockDirection,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    pub code: String,
    pub kind: CouponKind,
    /// Hundredths of a percent for `PERCENTAGE`, cents for `FIXED_AMOUNT`.
    pub value: u64,
    pub expiry_date: NaiveDate,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductPriceRequest {
    pub price_cents: u64,
}

fn default_active() -> bool {
    true
}
