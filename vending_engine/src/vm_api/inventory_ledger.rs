use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, Product, ProductRef, ProductStatus},
    helpers::KeyedLock,
    traits::InventoryManagement,
    vm_api::errors::LedgerError,
};

/// A product that the machine flagged as not selling, with the number of whole days since its last sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleProduct {
    pub id: i64,
    pub name: String,
    pub position: String,
    /// `None` if the product has never been sold.
    pub days_since_last_sale: Option<i64>,
}

/// `InventoryLedger` is the only writer of product stock, status and last-sold time.
///
/// Stock changes for one product are serialised through a per-product critical section. The backend's conditional
/// decrement backs this up, so stock cannot go negative even with several ledgers sharing a database.
pub struct InventoryLedger<B> {
    db: B,
    locks: KeyedLock<i64>,
}

impl<B: Clone> Clone for InventoryLedger<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), locks: self.locks.clone() }
    }
}

impl<B> Debug for InventoryLedger<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryLedger")
    }
}

impl<B> InventoryLedger<B> {
    pub fn new(db: B) -> Self {
        Self { db, locks: KeyedLock::new() }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> InventoryLedger<B>
where B: InventoryManagement
{
    pub async fn find(&self, product_id: i64) -> Result<Option<Product>, LedgerError> {
        Ok(self.db.fetch_product(product_id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Product>, LedgerError> {
        Ok(self.db.fetch_products().await?)
    }

    pub async fn find_by_id_or_position(&self, product: &ProductRef) -> Result<Product, LedgerError> {
        let found = match product {
            ProductRef::Id(id) => self.db.fetch_product(*id).await?,
            ProductRef::Position(p) => self.db.fetch_product_by_position(p).await?,
        };
        found.ok_or_else(|| LedgerError::ProductNotFound(product.to_string()))
    }

    /// Takes one unit of the product out of stock and stamps the sale time.
    pub async fn reserve_one(&self, product_id: i64) -> Result<Product, LedgerError> {
        let _guard = self.locks.lock(&product_id).await;
        match self.db.reserve_one(product_id, Utc::now()).await? {
            Some(product) => {
                debug!("📦️ Reserved one unit of {} (#{}). {} left", product.name, product.id, product.stock);
                if product.status == ProductStatus::LowStock {
                    info!("📦️ {} (#{}) is running low: {} left", product.name, product.id, product.stock);
                }
                Ok(product)
            },
            None => match self.db.fetch_product(product_id).await? {
                Some(_) => Err(LedgerError::OutOfStock(product_id)),
                None => Err(LedgerError::ProductNotFound(format!("#{product_id}"))),
            },
        }
    }

    /// Puts one unit back into stock. The last-sold time is left alone.
    pub async fn restore_one(&self, product_id: i64) -> Result<Product, LedgerError> {
        let _guard = self.locks.lock(&product_id).await;
        let product = self
            .db
            .restore_one(product_id)
            .await?
            .ok_or_else(|| LedgerError::ProductNotFound(format!("#{product_id}")))?;
        debug!("📦️ Restored one unit of {} (#{}). {} in stock", product.name, product.id, product.stock);
        Ok(product)
    }

    pub async fn find_cheapest_alternative(
        &self,
        max_price: Cents,
        exclude: &[i64],
    ) -> Result<Option<Product>, LedgerError> {
        Ok(self.db.fetch_cheapest_alternative(max_price, exclude).await?)
    }

    /// Applies a stock level reported by the machine's sensors. The reported level is taken as the truth.
    ///
    /// A `low_stock` flag of `true` forces the low-stock status. Otherwise the status follows the stock level.
    /// Inactive products stay inactive.
    pub async fn apply_stock_report(
        &self,
        product_id: i64,
        stock: Option<i64>,
        low_stock: Option<bool>,
    ) -> Result<Product, LedgerError> {
        if let Some(s) = stock.filter(|s| *s < 0) {
            return Err(LedgerError::InvalidStock(s));
        }
        let _guard = self.locks.lock(&product_id).await;
        let product =
            self.db.fetch_product(product_id).await?.ok_or_else(|| LedgerError::ProductNotFound(format!("#{product_id}")))?;
        let new_stock = stock.unwrap_or(product.stock);
        let status = match (product.status, low_stock) {
            (ProductStatus::Inactive, _) => ProductStatus::Inactive,
            (_, Some(true)) => ProductStatus::LowStock,
            (current, _) => ProductStatus::for_stock(current, new_stock, product.minimum_stock),
        };
        let updated = self
            .db
            .update_stock(product_id, new_stock, status)
            .await?
            .ok_or_else(|| LedgerError::ProductNotFound(format!("#{product_id}")))?;
        info!("📦️ Stock of {} (#{}) synced to {} ({})", updated.name, updated.id, updated.stock, updated.status);
        Ok(updated)
    }

    /// Flags the products in the given slots as low on stock. Unknown slots are skipped. Returns the products that
    /// were flagged.
    pub async fn flag_low_stock(&self, positions: &[String]) -> Result<Vec<Product>, LedgerError> {
        let mut flagged = Vec::with_capacity(positions.len());
        for position in positions {
            let Some(product) = self.db.fetch_product_by_position(position).await? else {
                warn!("📦️ Low stock alert for empty slot {position}. Ignoring it.");
                continue;
            };
            let _guard = self.locks.lock(&product.id).await;
            // Re-read inside the critical section so a concurrent sale is not overwritten.
            let Some(product) = self.db.fetch_product(product.id).await? else {
                continue;
            };
            if product.status == ProductStatus::Inactive {
                continue;
            }
            if let Some(p) = self.db.update_stock(product.id, product.stock, ProductStatus::LowStock).await? {
                info!("📦️ Low stock alert for {} in slot {position}", p.name);
                flagged.push(p);
            }
        }
        Ok(flagged)
    }

    /// Works out how long each of the given products has gone without a sale. Unknown ids are skipped.
    pub async fn idle_products(
        &self,
        product_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<Vec<IdleProduct>, LedgerError> {
        let mut result = Vec::with_capacity(product_ids.len());
        for id in product_ids {
            let Some(product) = self.db.fetch_product(*id).await? else {
                continue;
            };
            let days_since_last_sale = product.last_sold.map(|t| (now - t).num_days());
            match days_since_last_sale {
                Some(d) => info!("📦️ No sales alert: {} has not sold for {d} days", product.name),
                None => info!("📦️ No sales alert: {} has never sold", product.name),
            }
            result.push(IdleProduct {
                id: product.id,
                name: product.name,
                position: product.position,
                days_since_last_sale,
            });
        }
        Ok(result)
    }
}
