use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EXTERNAL_SEED_MERCHANT_ID: &str = "external_seed";

/// Stand-in for an absent merchant in dedup keys, so refs without a merchant never collide with
/// a merchant literally named "".
pub const NO_MERCHANT_KEY: &str = "~no_merchant~";

const TITLE_FIELDS: [&str; 6] =
	["title", "name", "display_name", "displayName", "product_title", "productTitle"];
const BRAND_FIELDS: [&str; 4] = ["brand", "vendor", "vendor_name", "manufacturer"];
const PRODUCT_ID_FIELDS: [&str; 3] = ["product_id", "productId", "id"];
const MERCHANT_ID_FIELDS: [&str; 2] = ["merchant_id", "merchantId"];
const MERCHANT_NAME_FIELDS: [&str; 4] =
	["merchant_name", "merchantName", "store_name", "storeName"];
const IN_STOCK_FIELDS: [&str; 2] = ["in_stock", "inStock"];
const INVENTORY_FIELDS: [&str; 2] = ["inventory_quantity", "inventoryQuantity"];
const ORDERABLE_FIELDS: [&str; 3] = ["orderable", "is_orderable", "isOrderable"];
const SOURCE_FIELDS: [&str; 2] = ["source", "source_type"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
	pub product_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub merchant_id: Option<String>,
}
impl ProductRef {
	/// Trimmed ref, or `None` when the product id is blank. A blank merchant id becomes `None`.
	pub fn new(product_id: &str, merchant_id: Option<&str>) -> Option<Self> {
		let product_id = product_id.trim();

		if product_id.is_empty() {
			return None;
		}

		let merchant_id =
			merchant_id.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string);

		Some(Self { product_id: product_id.to_string(), merchant_id })
	}

	pub fn dedup_key(&self) -> String {
		format!("{}::{}", self.merchant_id.as_deref().unwrap_or(NO_MERCHANT_KEY), self.product_id)
	}
}

/// Raw product record as returned by a candidate source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateProduct {
	pub product_id: String,
	pub merchant_id: Option<String>,
	pub title: String,
	pub brand: String,
	pub merchant_name: Option<String>,
	pub in_stock: Option<bool>,
	pub inventory_quantity: Option<f64>,
	pub orderable: Option<bool>,
	pub platform: Option<String>,
	pub source: Option<String>,
}
impl CandidateProduct {
	/// Decodes a product-like JSON object, accepting the field spellings used by the catalog
	/// cache and the search service. Returns `None` for non-objects.
	pub fn from_json(value: &Value) -> Option<Self> {
		let object = value.as_object()?;
		let product = Self {
			product_id: first_id(value, &PRODUCT_ID_FIELDS).unwrap_or_default(),
			merchant_id: first_id(value, &MERCHANT_ID_FIELDS),
			title: first_text(value, &TITLE_FIELDS).unwrap_or_default(),
			brand: brand_text(value).unwrap_or_default(),
			merchant_name: first_text(value, &MERCHANT_NAME_FIELDS),
			in_stock: IN_STOCK_FIELDS
				.iter()
				.find_map(|field| object.get(*field).and_then(Value::as_bool)),
			inventory_quantity: inventory_quantity(value),
			orderable: ORDERABLE_FIELDS
				.iter()
				.find_map(|field| object.get(*field).and_then(orderable_flag)),
			platform: first_text(value, &["platform"]),
			source: first_text(value, &SOURCE_FIELDS),
		};

		Some(product)
	}

	pub fn product_ref(&self) -> Option<ProductRef> {
		ProductRef::new(&self.product_id, self.merchant_id.as_deref())
	}

	/// Products seeded from outside any merchant catalog.
	pub fn is_external(&self) -> bool {
		if self.merchant_id.as_deref().map(str::trim) == Some(EXTERNAL_SEED_MERCHANT_ID) {
			return true;
		}
		if self.platform.as_deref().map(|value| value.trim().eq_ignore_ascii_case("external"))
			== Some(true)
		{
			return true;
		}
		if let Some(source) = self.source.as_deref() {
			let source = source.trim().to_lowercase();

			if source == "external" || source == EXTERNAL_SEED_MERCHANT_ID {
				return true;
			}
		}

		self.product_id.trim().starts_with("ext_")
	}
}

fn first_text(value: &Value, fields: &[&str]) -> Option<String> {
	fields.iter().find_map(|field| {
		value
			.get(*field)
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|text| !text.is_empty())
			.map(str::to_string)
	})
}

fn first_id(value: &Value, fields: &[&str]) -> Option<String> {
	fields.iter().find_map(|field| match value.get(*field) {
		Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
		Some(Value::Number(number)) => Some(number.to_string()),
		_ => None,
	})
}

fn brand_text(value: &Value) -> Option<String> {
	if let Some(name) =
		value.get("brand").and_then(|brand| brand.get("name")).and_then(Value::as_str)
		&& !name.trim().is_empty()
	{
		return Some(name.trim().to_string());
	}

	first_text(value, &BRAND_FIELDS)
}

fn inventory_quantity(value: &Value) -> Option<f64> {
	let raw = INVENTORY_FIELDS
		.iter()
		.find_map(|field| value.get(*field).filter(|raw| !raw.is_null()))
		.or_else(|| value.get("inventory").and_then(|inventory| inventory.get("quantity")))?;

	match raw {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => text.trim().parse::<f64>().ok(),
		_ => None,
	}
	.filter(|quantity| quantity.is_finite())
}

fn orderable_flag(raw: &Value) -> Option<bool> {
	match raw {
		Value::Bool(flag) => Some(*flag),
		Value::Null => None,
		Value::String(text) => Some(text.trim().eq_ignore_ascii_case("true")),
		other => Some(other.to_string().trim().eq_ignore_ascii_case("true")),
	}
}
