// SchemaManager's connection borrow cannot be named through the async_trait
// expansion, so the idiom lint is relaxed for this module.
#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_inventory_tables::Migration),
            Box::new(m20240101_000002_create_finance_tables::Migration),
            Box::new(m20240101_000003_create_permission_grants::Migration),
        ]
    }
}

mod m20240101_000001_create_inventory_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Warehouses::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Warehouses::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Warehouses::Kind).string_len(16).not_null())
                        .col(ColumnDef::new(Warehouses::Active).boolean().not_null().default(true))
                        .col(ColumnDef::new(Warehouses::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Warehouses::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Materials::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Materials::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(ColumnDef::new(Materials::Unit).string().not_null())
                        .col(ColumnDef::new(Materials::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Materials::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Unit).string().not_null())
                        .col(ColumnDef::new(Products::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Products::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockBalances::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StockBalances::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(StockBalances::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(StockBalances::ItemId).uuid().not_null())
                        .col(ColumnDef::new(StockBalances::ItemKind).string_len(16).not_null())
                        .col(
                            ColumnDef::new(StockBalances::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockBalances::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(StockBalances::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_balances_wh_item")
                        .table(StockBalances::Table)
                        .col(StockBalances::WarehouseId)
                        .col(StockBalances::ItemId)
                        .col(StockBalances::ItemKind)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MovementDocuments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MovementDocuments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MovementDocuments::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(MovementDocuments::Direction)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MovementDocuments::State).string_len(16).not_null())
                        .col(ColumnDef::new(MovementDocuments::SourceWarehouseId).uuid().null())
                        .col(ColumnDef::new(MovementDocuments::DestWarehouseId).uuid().null())
                        .col(ColumnDef::new(MovementDocuments::Notes).string().null())
                        .col(ColumnDef::new(MovementDocuments::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(MovementDocuments::ApprovedBy).uuid().null())
                        .col(ColumnDef::new(MovementDocuments::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(MovementDocuments::ApprovedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MovementLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(MovementLines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(MovementLines::DocumentId).uuid().not_null())
                        .col(ColumnDef::new(MovementLines::ItemId).uuid().not_null())
                        .col(ColumnDef::new(MovementLines::ItemKind).string_len(16).not_null())
                        .col(
                            ColumnDef::new(MovementLines::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MovementLines::UnitPrice).decimal_len(16, 4).null())
                        .col(ColumnDef::new(MovementLines::Amount).decimal_len(16, 4).null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movement_lines_document")
                                .from(MovementLines::Table, MovementLines::DocumentId)
                                .to(MovementDocuments::Table, MovementDocuments::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_movement_lines_document")
                        .table(MovementLines::Table)
                        .col(MovementLines::DocumentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockHistory::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StockHistory::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(StockHistory::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(StockHistory::ItemId).uuid().not_null())
                        .col(ColumnDef::new(StockHistory::ItemKind).string_len(16).not_null())
                        .col(ColumnDef::new(StockHistory::Direction).string_len(16).not_null())
                        .col(
                            ColumnDef::new(StockHistory::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockHistory::DocumentId).uuid().not_null())
                        .col(ColumnDef::new(StockHistory::ActorId).uuid().not_null())
                        .col(ColumnDef::new(StockHistory::RecordedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_history_wh_item")
                        .table(StockHistory::Table)
                        .col(StockHistory::WarehouseId)
                        .col(StockHistory::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(DocumentSequences::Prefix).string_len(8).not_null())
                        .col(ColumnDef::new(DocumentSequences::SeqDate).date().not_null())
                        .col(ColumnDef::new(DocumentSequences::LastValue).integer().not_null())
                        .primary_key(
                            Index::create()
                                .col(DocumentSequences::Prefix)
                                .col(DocumentSequences::SeqDate),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(DocumentSequences::Table).to_owned(),
                Table::drop().table(StockHistory::Table).to_owned(),
                Table::drop().table(MovementLines::Table).to_owned(),
                Table::drop().table(MovementDocuments::Table).to_owned(),
                Table::drop().table(StockBalances::Table).to_owned(),
                Table::drop().table(Products::Table).to_owned(),
                Table::drop().table(Materials::Table).to_owned(),
                Table::drop().table(Warehouses::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        Code,
        Name,
        BranchId,
        Kind,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
        Code,
        Name,
        Unit,
        BranchId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Code,
        Name,
        Unit,
        BranchId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum StockBalances {
        Table,
        Id,
        WarehouseId,
        ItemId,
        ItemKind,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum MovementDocuments {
        Table,
        Id,
        Code,
        Direction,
        State,
        SourceWarehouseId,
        DestWarehouseId,
        Notes,
        CreatedBy,
        ApprovedBy,
        CreatedAt,
        ApprovedAt,
    }

    #[derive(DeriveIden)]
    enum MovementLines {
        Table,
        Id,
        DocumentId,
        ItemId,
        ItemKind,
        Quantity,
        UnitPrice,
        Amount,
    }

    #[derive(DeriveIden)]
    enum StockHistory {
        Table,
        Id,
        WarehouseId,
        ItemId,
        ItemKind,
        Direction,
        Quantity,
        DocumentId,
        ActorId,
        RecordedAt,
    }

    #[derive(DeriveIden)]
    enum DocumentSequences {
        Table,
        Prefix,
        SeqDate,
        LastValue,
    }
}

mod m20240101_000002_create_finance_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_finance_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Partners::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Partners::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Partners::Kind).string_len(16).not_null())
                        .col(ColumnDef::new(Partners::Name).string().not_null())
                        .col(
                            ColumnDef::new(Partners::DebtAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Partners::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Partners::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SalesOrders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SalesOrders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(SalesOrders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SalesOrders::PartnerId).uuid().not_null())
                        .col(
                            ColumnDef::new(SalesOrders::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrders::PaidAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesOrders::PaymentStatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesOrders::Status).string().not_null())
                        .col(ColumnDef::new(SalesOrders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(SalesOrders::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_orders_partner_created")
                        .table(SalesOrders::Table)
                        .col(SalesOrders::PartnerId)
                        .col(SalesOrders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(PurchaseOrders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::PartnerId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::PaidAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::PaymentStatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(ColumnDef::new(PurchaseOrders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(PurchaseOrders::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchase_orders_partner_created")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::PartnerId)
                        .col(PurchaseOrders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BankAccounts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BankAccounts::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(BankAccounts::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(BankAccounts::Name).string().not_null())
                        .col(ColumnDef::new(BankAccounts::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(BankAccounts::Balance)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BankAccounts::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(BankAccounts::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(BankAccounts::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LedgerEntries::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(LedgerEntries::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(LedgerEntries::EntryType).string_len(16).not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::Amount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LedgerEntries::PaymentMethod)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::BankAccountId).uuid().null())
                        .col(ColumnDef::new(LedgerEntries::PartnerId).uuid().not_null())
                        .col(ColumnDef::new(LedgerEntries::Reference).string().null())
                        .col(ColumnDef::new(LedgerEntries::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(LedgerEntries::EntryDate).date().not_null())
                        .col(ColumnDef::new(LedgerEntries::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Table::drop().table(LedgerEntries::Table).to_owned(),
                Table::drop().table(BankAccounts::Table).to_owned(),
                Table::drop().table(PurchaseOrders::Table).to_owned(),
                Table::drop().table(SalesOrders::Table).to_owned(),
                Table::drop().table(Partners::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Partners {
        Table,
        Id,
        Kind,
        Name,
        DebtAmount,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SalesOrders {
        Table,
        Id,
        OrderNumber,
        PartnerId,
        TotalAmount,
        PaidAmount,
        PaymentStatus,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        OrderNumber,
        PartnerId,
        TotalAmount,
        PaidAmount,
        PaymentStatus,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BankAccounts {
        Table,
        Id,
        Code,
        Name,
        BranchId,
        Balance,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum LedgerEntries {
        Table,
        Id,
        EntryType,
        Amount,
        PaymentMethod,
        BankAccountId,
        PartnerId,
        Reference,
        CreatedBy,
        EntryDate,
        CreatedAt,
    }
}

mod m20240101_000003_create_permission_grants {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_permission_grants"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PermissionGrants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PermissionGrants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PermissionGrants::RoleId).uuid().not_null())
                        .col(ColumnDef::new(PermissionGrants::Resource).string().not_null())
                        .col(ColumnDef::new(PermissionGrants::CanView).boolean().not_null())
                        .col(ColumnDef::new(PermissionGrants::CanCreate).boolean().not_null())
                        .col(ColumnDef::new(PermissionGrants::CanEdit).boolean().not_null())
                        .col(ColumnDef::new(PermissionGrants::CanDelete).boolean().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_permission_grants_role_resource")
                        .table(PermissionGrants::Table)
                        .col(PermissionGrants::RoleId)
                        .col(PermissionGrants::Resource)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PermissionGrants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PermissionGrants {
        Table,
        Id,
        RoleId,
        Resource,
        CanView,
        CanCreate,
        CanEdit,
        CanDelete,
    }
}
