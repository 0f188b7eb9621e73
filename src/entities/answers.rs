use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "answers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub question_id: i32,

    pub is_correct: bool,

    /// `left` or `right`, matching questions only.
    pub match_side: Option<String>,

    /// Left and right answers sharing a group form a correct pair.
    pub match_group: Option<i32>,

    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::questions::Entity",
        from = "Column::QuestionId",
        to = "super::questions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Questions,
    #[sea_orm(has_many = "super::answer_translations::Entity")]
    AnswerTranslations,
}

impl Related<super::questions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Questions.def()
    }
}

impl Related<super::answer_translations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnswerTranslations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
