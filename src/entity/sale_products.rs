use sea_orm::entity::prelude::*;
use serde_json::Value;

/// Snapshot row written by the catalog ingestion job; the whole table is
/// replaced on every successful run.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sale_products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub name: String,
    pub discount_percent: i32,
    pub image_url: Option<String>,
    pub category: String,
    pub regional_prices: Value,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
