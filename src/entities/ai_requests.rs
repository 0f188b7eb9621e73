use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "ai_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    /// Test created from the response, when generation succeeded.
    pub test_id: Option<i32>,

    /// `generate_quiz` or `explain_answer`.
    pub request_type: String,

    pub model: String,

    pub language_code: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub prompt: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub response: Option<String>,

    pub prompt_tokens: Option<i32>,

    pub completion_tokens: Option<i32>,

    pub total_tokens: Option<i32>,

    pub cost_usd: Option<f64>,

    /// `pending`, `success` or `failed`.
    pub status: String,

    pub error_message: Option<String>,

    pub duration_ms: Option<i64>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
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
    #[sea_orm(
        belongs_to = "super::tests::Entity",
        from = "Column::TestId",
        to = "super::tests::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Tests,
}

impl ActiveModelBehavior for ActiveModel {}
