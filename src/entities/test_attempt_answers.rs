use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_attempt_answers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub attempt_id: i32,

    pub question_id: i32,

    /// Chosen answer for choice questions.
    pub answer_id: Option<i32>,

    /// Free text for text questions.
    pub user_answer_text: Option<String>,

    /// JSON array of `{left_id, right_id}` pairs for matching questions.
    pub user_answer_payload: Option<String>,

    pub is_correct: bool,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_attempts::Entity",
        from = "Column::AttemptId",
        to = "super::test_attempts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TestAttempts,
    #[sea_orm(
        belongs_to = "super::questions::Entity",
        from = "Column::QuestionId",
        to = "super::questions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Questions,
}

impl Related<super::test_attempts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestAttempts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
