use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per crawled page, keyed by the job id that produced it
        manager
            .create_table(
                Table::create()
                    .table(CrawlPages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawlPages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrawlPages::ParentId).uuid())
                    .col(ColumnDef::new(CrawlPages::Url).text().not_null())
                    .col(ColumnDef::new(CrawlPages::Title).text().not_null().default(""))
                    .col(ColumnDef::new(CrawlPages::FilePath).text().not_null())
                    .col(ColumnDef::new(CrawlPages::ParsedData).json().not_null())
                    .col(ColumnDef::new(CrawlPages::Status).string().not_null())
                    .col(ColumnDef::new(CrawlPages::DepthLevel).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(CrawlPages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CrawlPages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_pages_parent_id")
                    .table(CrawlPages::Table)
                    .col(CrawlPages::ParentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CrawlPages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CrawlPages {
    Table,
    Id,
    ParentId,
    Url,
    Title,
    FilePath,
    ParsedData,
    Status,
    DepthLevel,
    CreatedAt,
    UpdatedAt,
}
