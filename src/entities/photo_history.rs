use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "photo_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    /// Storage key in the photo store. Immutable once written.
    pub photo_path: String,

    /// RFC3339 timestamp the photo became current.
    pub used_from: String,

    /// RFC3339 timestamp the photo stopped being current; None while current.
    pub used_until: Option<String>,

    /// At most one row per user may be current at any time.
    pub is_current: bool,

    /// True when `used_from` was backdated by a backfill rather than
    /// observed directly.
    pub from_estimated: bool,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
