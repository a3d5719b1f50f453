//! Cart line items and the edits the TTL controller observes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sellable size of a catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub size_id: u64,
    pub size: String,
    pub price: f64,
}

/// The slice of a catalog product the cart needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: u64,
    pub product_name: String,
    #[serde(default)]
    pub image_url_primary: Option<String>,
    pub variants: Vec<Variant>,
}

impl Product {
    /// Variant offered under `size_id`.
    pub fn variant(&self, size_id: u64) -> Option<&Variant> {
        self.variants.iter().find(|v| v.size_id == size_id)
    }
}

/// One line of the cart, unique by `(product_id, size_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: u64,
    pub size_id: u64,
    pub product_name: String,
    pub price: f64,
    pub size: String,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Stock bound supplied by the latest add of this line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_limit: Option<u32>,
}

impl CartItem {
    /// Whether this line has the given uniqueness key.
    pub fn is(&self, product_id: u64, size_id: u64) -> bool {
        self.product_id == product_id && self.size_id == size_id
    }

    /// Price of the whole line.
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Which cart command ran, as seen by the TTL controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Increment,
    Decrement,
    Remove,
    Replace,
    Clear,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Add => write!(f, "add"),
            MutationKind::Increment => write!(f, "increment"),
            MutationKind::Decrement => write!(f, "decrement"),
            MutationKind::Remove => write!(f, "remove"),
            MutationKind::Replace => write!(f, "replace"),
            MutationKind::Clear => write!(f, "clear"),
        }
    }
}

/// Ordered collection of cart lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from persisted lines, normalising them on the way in.
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut cart = Self::new();
        cart.replace(items);
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    pub fn total_price(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn find(&self, product_id: u64, size_id: u64) -> Option<&CartItem> {
        self.items.iter().find(|item| item.is(product_id, size_id))
    }

    fn find_mut(&mut self, product_id: u64, size_id: u64) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| item.is(product_id, size_id))
    }

    /// Add `quantity` units of a product variant, bounded by `available_stock`.
    ///
    /// A quantity of zero counts as one. The whole request is rejected, and
    /// the cart left untouched, when the resulting line would exceed stock.
    pub fn add(
        &mut self,
        product: &Product,
        size_id: u64,
        quantity: u32,
        available_stock: u32,
    ) -> Result<&CartItem> {
        let requested = quantity.max(1);
        let current = self
            .find(product.product_id, size_id)
            .map_or(0, |item| item.quantity);
        let wanted = current.saturating_add(requested);

        if wanted > available_stock {
            return Err(Error::StockExceeded {
                product_name: product.product_name.clone(),
                size_id,
                available: available_stock,
            });
        }

        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.is(product.product_id, size_id))
        {
            let item = &mut self.items[index];
            item.quantity = wanted;
            item.stock_limit = Some(available_stock);
            return Ok(&self.items[index]);
        }

        let variant = product
            .variant(size_id)
            .ok_or(Error::UnknownVariant {
                product_id: product.product_id,
                size_id,
            })?;

        self.items.push(CartItem {
            product_id: product.product_id,
            size_id,
            product_name: product.product_name.clone(),
            price: variant.price,
            size: variant.size.clone(),
            quantity: requested,
            image_url: product.image_url_primary.clone(),
            stock_limit: Some(available_stock),
        });
        Ok(&self.items[self.items.len() - 1])
    }

    /// Add one unit to an existing line. Returns `Ok(false)` if no such line.
    pub fn increment(&mut self, product_id: u64, size_id: u64) -> Result<bool> {
        let Some(item) = self.find_mut(product_id, size_id) else {
            return Ok(false);
        };

        if let Some(limit) = item.stock_limit
            && item.quantity >= limit
        {
            return Err(Error::StockExceeded {
                product_name: item.product_name.clone(),
                size_id,
                available: limit,
            });
        }

        item.quantity += 1;
        Ok(true)
    }

    /// Take one unit off a line, never going below one.
    pub fn decrement(&mut self, product_id: u64, size_id: u64) -> bool {
        match self.find_mut(product_id, size_id) {
            Some(item) if item.quantity > 1 => {
                item.quantity -= 1;
                true
            }
            _ => false,
        }
    }

    /// Drop a line entirely. Returns whether it existed.
    pub fn remove(&mut self, product_id: u64, size_id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| !item.is(product_id, size_id));
        self.items.len() != before
    }

    /// Replace every line.
    ///
    /// Lines with zero quantity are dropped and repeated keys are merged into
    /// their first occurrence so the collection invariants hold.
    pub fn replace(&mut self, items: Vec<CartItem>) {
        self.items.clear();
        for item in items.into_iter().filter(|item| item.quantity > 0) {
            match self.find_mut(item.product_id, item.size_id) {
                Some(existing) => {
                    let merged = existing.quantity.saturating_add(item.quantity);
                    existing.quantity = match existing.stock_limit {
                        Some(limit) => merged.min(limit.max(1)),
                        None => merged,
                    };
                }
                None => self.items.push(item),
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
