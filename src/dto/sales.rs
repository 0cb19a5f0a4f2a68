use serde::Serialize;
use utoipa::ToSchema;

use crate::models::SaleProduct;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SaleList {
    #[schema(value_type = Vec<SaleProduct>)]
    pub items: Vec<SaleProduct>,
}
