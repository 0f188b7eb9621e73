use crate::entities::prelude::*;
use crate::entities::{
    ai_requests, answer_translations, api_tokens, question_translations, system_logs,
    test_attempts, test_translations,
};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EntityTrait, Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

async fn create_from_entity<E>(manager: &SchemaManager<'_>, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    manager
        .create_table(
            schema
                .create_table_from_entity(entity)
                .if_not_exists()
                .to_owned(),
        )
        .await
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // Parents before children so foreign keys resolve on every backend.
        create_from_entity(manager, &schema, Users).await?;
        create_from_entity(manager, &schema, Languages).await?;
        create_from_entity(manager, &schema, Categories).await?;
        create_from_entity(manager, &schema, Difficulties).await?;
        create_from_entity(manager, &schema, Tests).await?;
        create_from_entity(manager, &schema, TestTranslations).await?;
        create_from_entity(manager, &schema, Questions).await?;
        create_from_entity(manager, &schema, QuestionTranslations).await?;
        create_from_entity(manager, &schema, Answers).await?;
        create_from_entity(manager, &schema, AnswerTranslations).await?;
        create_from_entity(manager, &schema, TestAttempts).await?;
        create_from_entity(manager, &schema, TestAttemptAnswers).await?;
        create_from_entity(manager, &schema, AiRequests).await?;
        create_from_entity(manager, &schema, ApiTokens).await?;
        create_from_entity(manager, &schema, SystemLogs).await?;

        // One translation row per (entity, language).
        manager
            .create_index(
                Index::create()
                    .name("idx_test_translations_test_language")
                    .table(TestTranslations)
                    .col(test_translations::Column::TestId)
                    .col(test_translations::Column::LanguageId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_question_translations_question_language")
                    .table(QuestionTranslations)
                    .col(question_translations::Column::QuestionId)
                    .col(question_translations::Column::LanguageId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_answer_translations_answer_language")
                    .table(AnswerTranslations)
                    .col(answer_translations::Column::AnswerId)
                    .col(answer_translations::Column::LanguageId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_tokens_family")
                    .table(ApiTokens)
                    .col(api_tokens::Column::FamilyId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_tokens_user")
                    .table(ApiTokens)
                    .col(api_tokens::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_test_attempts_user")
                    .table(TestAttempts)
                    .col(test_attempts::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ai_requests_user_created")
                    .table(AiRequests)
                    .col(ai_requests::Column::UserId)
                    .col(ai_requests::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_system_logs_created_at")
                    .table(SystemLogs)
                    .col(system_logs::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemLogs).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApiTokens).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AiRequests).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestAttemptAnswers).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestAttempts).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnswerTranslations).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Answers).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QuestionTranslations).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Questions).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestTranslations).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tests).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Difficulties).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Languages).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).if_exists().to_owned())
            .await?;

        Ok(())
    }
}
