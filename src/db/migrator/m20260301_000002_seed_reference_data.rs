use crate::entities::prelude::*;
use crate::entities::{categories, difficulties, languages, users};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Bootstrap admin credentials. Change the password after the first login.
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";
pub const BOOTSTRAP_ADMIN_PASSWORD: &str = "password";

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("pl", "Polski"),
    ("de", "Deutsch"),
    ("es", "Español"),
    ("fr", "Français"),
];

const CATEGORIES: &[(&str, &str)] = &[
    ("general", "General knowledge"),
    ("geography", "Geography"),
    ("history", "History"),
    ("science", "Science"),
    ("languages", "Languages"),
    ("technology", "Technology"),
];

const DIFFICULTIES: &[(&str, &str, i32)] = &[
    ("easy", "Easy", 1),
    ("medium", "Medium", 2),
    ("hard", "Hard", 3),
];

fn hash_bootstrap_password() -> Result<String, DbErr> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(BOOTSTRAP_ADMIN_PASSWORD.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbErr::Custom(format!("Failed to hash bootstrap password: {e}")))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert
            .into_table(Languages)
            .columns([languages::Column::Code, languages::Column::Name]);
        for (code, name) in LANGUAGES {
            insert.values_panic([(*code).into(), (*name).into()]);
        }
        manager.exec_stmt(insert).await?;

        let mut insert = Query::insert();
        insert
            .into_table(Categories)
            .columns([categories::Column::Slug, categories::Column::Name]);
        for (slug, name) in CATEGORIES {
            insert.values_panic([(*slug).into(), (*name).into()]);
        }
        manager.exec_stmt(insert).await?;

        let mut insert = Query::insert();
        insert.into_table(Difficulties).columns([
            difficulties::Column::Slug,
            difficulties::Column::Name,
            difficulties::Column::Level,
        ]);
        for (slug, name, level) in DIFFICULTIES {
            insert.values_panic([(*slug).into(), (*name).into(), (*level).into()]);
        }
        manager.exec_stmt(insert).await?;

        let now = chrono::Utc::now();
        let password_hash = hash_bootstrap_password()?;

        let insert = Query::insert()
            .into_table(Users)
            .columns([
                users::Column::Username,
                users::Column::Email,
                users::Column::PasswordHash,
                users::Column::Role,
                users::Column::IsActive,
                users::Column::IsBlocked,
                users::Column::CreatedAt,
                users::Column::UpdatedAt,
            ])
            .values_panic([
                BOOTSTRAP_ADMIN_USERNAME.into(),
                "admin@localhost".into(),
                password_hash.into(),
                "admin".into(),
                true.into(),
                false.into(),
                now.into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Users)
                    .and_where(Expr::col(users::Column::Username).eq(BOOTSTRAP_ADMIN_USERNAME))
                    .to_owned(),
            )
            .await?;
        manager
            .exec_stmt(Query::delete().from_table(Difficulties).to_owned())
            .await?;
        manager
            .exec_stmt(Query::delete().from_table(Categories).to_owned())
            .await?;
        manager
            .exec_stmt(Query::delete().from_table(Languages).to_owned())
            .await?;

        Ok(())
    }
}
