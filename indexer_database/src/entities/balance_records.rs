use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "balance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub market_id: String,
    pub user_id: String,
    pub supply_balance: BigDecimal,
    pub borrow_balance: BigDecimal,
    pub timestamp: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
