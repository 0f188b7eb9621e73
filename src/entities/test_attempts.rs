use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "test_attempts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub test_id: i32,

    pub user_id: i32,

    pub language_id: i32,

    /// `in_progress` or `finished`.
    pub status: String,

    /// Percentage of correctly answered questions, two decimals.
    pub score: f64,

    pub correct_answers: i32,

    pub total_questions: i32,

    pub started_at: ChronoDateTimeUtc,

    pub finished_at: Option<ChronoDateTimeUtc>,

    pub duration_seconds: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tests::Entity",
        from = "Column::TestId",
        to = "super::tests::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Tests,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::languages::Entity",
        from = "Column::LanguageId",
        to = "super::languages::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Languages,
    #[sea_orm(has_many = "super::test_attempt_answers::Entity")]
    TestAttemptAnswers,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::test_attempt_answers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestAttemptAnswers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
