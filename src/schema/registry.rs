//! Table registry for the sales-estimates dataset

use super::{ColumnDef, ColumnType, SchemaDescriptor};

use ColumnType::{BigInt, Boolean, Date, Decimal, Integer, Timestamp, Varchar};

const fn col(name: &'static str, column_type: ColumnType) -> ColumnDef {
    ColumnDef::new(name, column_type)
}

pub static CATEGORY_TREE_V2: SchemaDescriptor = SchemaDescriptor {
    table_name: "tb_category_tree_v2",
    columns: &[
        col("marketplace", Varchar(5)),
        col("year", Integer),
        col("week", Varchar(3)),
        col("end_date", Date),
        col("start_date", Date),
        col("category_id", BigInt),
        col("active", Boolean),
        col("category_name", Varchar(768)),
        col("preceding_category_id", BigInt),
        col("root_category_id", BigInt),
        col("root_category_name", Varchar(768)),
        col("path_by_id", Varchar(768)),
        col("path_by_name", Varchar(768)),
        col("path_by_id_array", Varchar(768)),
        col("path_by_name_array", Varchar(768)),
        col("category_tree_level", Integer),
        col("subcategory_count", Integer),
        col("updated_at", Date),
    ],
    partition_keys: &["marketplace", "year", "week"],
    primary_key: &["marketplace", "year", "week", "end_date", "category_id"],
};

pub static CATEGORY_TREE_V2_LATEST: SchemaDescriptor = SchemaDescriptor {
    table_name: "tb_category_tree_v2_latest",
    columns: &[
        col("marketplace", Varchar(5)),
        col("end_date", Date),
        col("start_date", Date),
        col("category_id", BigInt),
        col("active", Boolean),
        col("category_name", Varchar(768)),
        col("preceding_category_id", BigInt),
        col("root_category_id", BigInt),
        col("root_category_name", Varchar(768)),
        col("path_by_id", Varchar(768)),
        col("path_by_name", Varchar(768)),
        col("path_by_id_array", Varchar(768)),
        col("path_by_name_array", Varchar(768)),
        col("category_tree_level", Integer),
        col("subcategory_count", Integer),
        col("updated_at", Date),
    ],
    partition_keys: &["marketplace"],
    primary_key: &["marketplace", "end_date", "start_date", "category_id"],
};

pub static SALES_ESTIMATES_WEEKLY_V2: SchemaDescriptor = SchemaDescriptor {
    table_name: "tb_sales_estimates_weekly_v2",
    columns: &[
        col("marketplace", Varchar(5)),
        col("root_category_id", BigInt),
        col("year", Integer),
        col("week", Varchar(3)),
        col("start_date", Date),
        col("end_date", Date),
        col("asin", Varchar(40)),
        col("is_available", Integer),
        col("category_rank", BigInt),
        col("subcategory_rank", BigInt),
        col("brand", Varchar(1000)),
        col("name", Varchar(1000)),
        col("image_url", Varchar(1000)),
        col("price", Decimal(10, 2)),
        col("review_count", BigInt),
        col("ratings", Decimal(3, 1)),
        col("breadcrumb_path_category_ids", Varchar(1000)),
        col("ranking_category_ids", Varchar(1000)),
        col("first_date_available", Timestamp),
        col("revenue", Decimal(20, 2)),
        col("revenue_1p", Decimal(20, 2)),
        col("revenue_3p", Decimal(20, 2)),
        col("sales", Decimal(20, 2)),
        col("sales_1p", Decimal(20, 2)),
        col("sales_3p", Decimal(20, 2)),
        col("seller_ids", Varchar(1000)),
        col("seller_id_mode", Varchar(1000)),
        col("seller_types", Varchar(100)),
    ],
    partition_keys: &["marketplace", "root_category_id", "year", "week"],
    primary_key: &[
        "marketplace",
        "root_category_id",
        "year",
        "week",
        "start_date",
        "end_date",
        "asin",
    ],
};

pub static SALES_ESTIMATES_WEEKLY_V2_LATEST: SchemaDescriptor = SchemaDescriptor {
    table_name: "tb_sales_estimates_weekly_v2_latest",
    columns: &[
        col("marketplace", Varchar(5)),
        col("root_category_id", BigInt),
        col("start_date", Date),
        col("end_date", Date),
        col("asin", Varchar(40)),
        col("is_available", Integer),
        col("category_rank", BigInt),
        col("subcategory_rank", BigInt),
        col("brand", Varchar(1000)),
        col("name", Varchar(1000)),
        col("image_url", Varchar(1000)),
        col("price", Decimal(10, 2)),
        col("review_count", BigInt),
        col("ratings", Decimal(3, 1)),
        col("breadcrumb_path_category_ids", Varchar(1000)),
        col("ranking_category_ids", Varchar(1000)),
        col("first_date_available", Timestamp),
        col("revenue", Decimal(20, 2)),
        col("revenue_1p", Decimal(20, 2)),
        col("revenue_3p", Decimal(20, 2)),
        col("sales", Decimal(20, 2)),
        col("sales_1p", Decimal(20, 2)),
        col("sales_3p", Decimal(20, 2)),
        col("seller_ids", Varchar(1000)),
        col("seller_id_mode", Varchar(1000)),
        col("seller_types", Varchar(100)),
    ],
    partition_keys: &["marketplace", "root_category_id"],
    primary_key: &[
        "marketplace",
        "root_category_id",
        "start_date",
        "end_date",
        "asin",
    ],
};

/// One row per (week key, seller)
pub static DATA_WEEK: SchemaDescriptor = SchemaDescriptor {
    table_name: "tb_data_week",
    columns: &[
        col("marketplace", Varchar(5)).not_null(),
        col("root_category_id", BigInt).not_null(),
        col("year", Integer).not_null(),
        col("week", Varchar(3)).not_null(),
        col("start_date", Date).not_null(),
        col("end_date", Date).not_null(),
        col("asin", Varchar(40)).not_null(),
        col("seller_id", Varchar(100)).not_null().with_default("''"),
        col("is_available", Integer),
        col("category_rank", BigInt),
        col("subcategory_rank", BigInt),
        col("price", Decimal(10, 2)),
        col("review_count", BigInt),
        col("ratings", Decimal(3, 1)),
        col("revenue", Decimal(20, 2)),
        col("revenue_1p", Decimal(20, 2)),
        col("revenue_3p", Decimal(20, 2)),
        col("sales", Decimal(20, 2)),
        col("sales_1p", Decimal(20, 2)),
        col("sales_3p", Decimal(20, 2)),
        col("revenue_org", Decimal(20, 2)),
        col("revenue_1p_org", Decimal(20, 2)),
        col("revenue_3p_org", Decimal(20, 2)),
        col("sales_org", Decimal(20, 2)),
        col("sales_1p_org", Decimal(20, 2)),
        col("sales_3p_org", Decimal(20, 2)),
        col("seller_num", Integer).with_default("0"),
    ],
    partition_keys: &[],
    primary_key: &[
        "marketplace",
        "root_category_id",
        "year",
        "week",
        "start_date",
        "end_date",
        "asin",
        "seller_id",
    ],
};

/// One row per (product key, seller)
pub static DATA_PRODUCT: SchemaDescriptor = SchemaDescriptor {
    table_name: "tb_data_product",
    columns: &[
        col("marketplace", Varchar(5)).not_null(),
        col("root_category_id", BigInt).not_null(),
        col("asin", Varchar(40)).not_null(),
        col("seller_id", Varchar(100)).not_null().with_default("''"),
        col("brand", Varchar(1000)),
        col("name", Varchar(1000)),
        col("image_url", Varchar(1000)),
        col("category_path", Varchar(1000)),
        col("category_id0", BigInt),
        col("category_id1", BigInt),
        col("category_id2", BigInt),
        col("category_id3", BigInt),
        col("category_id4", BigInt),
        col("category_id5", BigInt),
        col("category_id6", BigInt),
        col("first_date_available", Timestamp),
        col("seller_num", Integer).with_default("0"),
        col("seller_types", Varchar(100)),
        col("data_type", Integer).not_null().with_default("0"),
    ],
    partition_keys: &[],
    primary_key: &["marketplace", "root_category_id", "asin", "seller_id"],
};

/// Ledger of ingested files
pub static LOADED_RECORDS: SchemaDescriptor = SchemaDescriptor {
    table_name: "tb_loaded_records",
    columns: &[
        col("table_name", Varchar(100)).not_null(),
        col("marketplace", Varchar(50)).with_default("'0'"),
        col("root_category_id", BigInt).with_default("-1"),
        col("year", Integer).with_default("0"),
        col("week", Varchar(10)).with_default("'0'"),
        col("file_name", Varchar(255)),
    ],
    partition_keys: &[],
    primary_key: &[
        "table_name",
        "marketplace",
        "root_category_id",
        "year",
        "week",
        "file_name",
    ],
};

/// A partitioned source table and its directory below the base path
#[derive(Debug, Clone, Copy)]
pub struct SourceTable {
    pub relative_path: &'static str,
    pub schema: &'static SchemaDescriptor,
}

static SOURCE_TABLES: [SourceTable; 4] = [
    SourceTable {
        relative_path: "version=2/format=csv/table=category_tree_v2/",
        schema: &CATEGORY_TREE_V2,
    },
    SourceTable {
        relative_path: "version=2/format=csv/table=category_tree_v2_latest/",
        schema: &CATEGORY_TREE_V2_LATEST,
    },
    SourceTable {
        relative_path: "version=2/format=csv/table=sales_estimates_weekly_v2/",
        schema: &SALES_ESTIMATES_WEEKLY_V2,
    },
    SourceTable {
        relative_path: "version=2/format=csv/table=sales_estimates_weekly_v2_latest/",
        schema: &SALES_ESTIMATES_WEEKLY_V2_LATEST,
    },
];

/// Partitioned tables loaded from files, in load order
pub fn source_tables() -> &'static [SourceTable] {
    &SOURCE_TABLES
}

/// Every table the loader manages
pub fn all_tables() -> [&'static SchemaDescriptor; 7] {
    [
        &CATEGORY_TREE_V2,
        &CATEGORY_TREE_V2_LATEST,
        &SALES_ESTIMATES_WEEKLY_V2,
        &SALES_ESTIMATES_WEEKLY_V2_LATEST,
        &DATA_WEEK,
        &DATA_PRODUCT,
        &LOADED_RECORDS,
    ]
}

pub fn lookup(table_name: &str) -> Option<&'static SchemaDescriptor> {
    all_tables()
        .into_iter()
        .find(|schema| schema.table_name == table_name)
}
