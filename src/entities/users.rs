use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// RFC3339 timestamp; cleared whenever the email changes.
    pub email_verified_at: Option<String>,

    /// Storage key of the current profile photo. Mirrors the single
    /// `is_current` row in `photo_history` for this user.
    pub avatar_path: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::photo_history::Entity")]
    PhotoHistory,
}

impl Related<super::photo_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PhotoHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
