use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "api_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Public half of the bearer value (`<token_id>.<secret>`).
    #[sea_orm(unique)]
    pub token_id: String,

    pub user_id: i32,

    /// Hex SHA-256 of the secret half. The secret itself is never stored.
    pub token_hash: String,

    /// `access` or `refresh`.
    pub token_type: String,

    /// Shared by every token descended from one login.
    pub family_id: String,

    pub parent_token_id: Option<i32>,

    pub replaced_by_token_id: Option<i32>,

    pub ip_address: Option<String>,

    pub user_agent: Option<String>,

    pub expires_at: ChronoDateTimeUtc,

    /// Set when a refresh token has been rotated.
    pub used_at: Option<ChronoDateTimeUtc>,

    pub last_used_at: Option<ChronoDateTimeUtc>,

    pub revoked_at: Option<ChronoDateTimeUtc>,

    pub revoked_reason: Option<String>,

    pub created_at: ChronoDateTimeUtc,
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
