use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: String,
    pub total_supply_in_reference_unit: BigDecimal,
    pub total_borrow_in_reference_unit: BigDecimal,
    /// `None` means the user carries no borrow and the ratio is infinite
    pub liquidity_ratio: Option<BigDecimal>,
    pub available_to_borrow_in_reference_unit: BigDecimal,
    pub timestamp: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
