//! Multi-valued seller column expansion
//!
//! A wide sales row packs every seller of a listing into `seller_id_mode`
//! as `A|B|C`. Expansion emits one normalized row per seller with the
//! additive metrics divided by the seller count and the undivided values
//! kept in the `*_org` columns.

pub mod runner;

use std::collections::BTreeMap;

use serde::Serialize;

pub use crate::config::{EmptySellerPolicy, ExpansionTarget};
pub use runner::{MultiValueExpander, ShardStore};

/// Separator packed into `seller_id_mode` and `breadcrumb_path_category_ids`
pub const VALUE_SEPARATOR: char = '|';

/// Number of `category_id{n}` levels on the product table
pub const CATEGORY_LEVELS: usize = 7;

/// Additive metrics apportioned across sellers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub revenue: Option<f64>,
    pub revenue_1p: Option<f64>,
    pub revenue_3p: Option<f64>,
    pub sales: Option<f64>,
    pub sales_1p: Option<f64>,
    pub sales_3p: Option<f64>,
}

impl Metrics {
    pub const COLUMNS: [&'static str; 6] = [
        "revenue",
        "revenue_1p",
        "revenue_3p",
        "sales",
        "sales_1p",
        "sales_3p",
    ];

    /// Values in [`Metrics::COLUMNS`] order
    pub fn values(&self) -> [Option<f64>; 6] {
        [
            self.revenue,
            self.revenue_1p,
            self.revenue_3p,
            self.sales,
            self.sales_1p,
            self.sales_3p,
        ]
    }

    /// Share of every metric held by `parts` of `k` segments
    pub fn apportioned(&self, parts: usize, k: usize) -> Metrics {
        let k = k.max(1) as f64;
        let parts = parts as f64;
        let share = |v: Option<f64>| v.map(|v| v * parts / k);
        Metrics {
            revenue: share(self.revenue),
            revenue_1p: share(self.revenue_1p),
            revenue_3p: share(self.revenue_3p),
            sales: share(self.sales),
            sales_1p: share(self.sales_1p),
            sales_3p: share(self.sales_3p),
        }
    }
}

/// A row of a weekly sales-estimates table as read for expansion.
///
/// Dates and timestamps travel as their canonical text form and are cast
/// back on write.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WideRow {
    pub marketplace: String,
    pub root_category_id: i64,
    /// Absent on the latest snapshot table
    pub year: Option<i32>,
    pub week: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub asin: String,
    pub is_available: Option<i32>,
    pub category_rank: Option<i64>,
    pub subcategory_rank: Option<i64>,
    pub brand: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub review_count: Option<i64>,
    pub ratings: Option<f64>,
    pub breadcrumb_path_category_ids: Option<String>,
    pub first_date_available: Option<String>,
    pub metrics: Metrics,
    pub seller_id_mode: Option<String>,
    pub seller_types: Option<String>,
}

/// Business key a group of candidate rows collapses to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub marketplace: String,
    pub root_category_id: i64,
    pub year: Option<i32>,
    pub week: Option<String>,
    pub asin: String,
}

impl GroupKey {
    pub fn of(target: ExpansionTarget, row: &WideRow) -> Self {
        let (year, week) = match target {
            ExpansionTarget::Week => (row.year, row.week.clone()),
            ExpansionTarget::Product => (None, None),
        };
        Self {
            marketplace: row.marketplace.clone(),
            root_category_id: row.root_category_id,
            year,
            week,
            asin: row.asin.clone(),
        }
    }
}

/// Ordering used to pick one row per business key; greatest wins and
/// `None` sorts lowest
fn tie_break(row: &WideRow) -> (Option<&str>, Option<&str>, Option<&str>) {
    (
        row.breadcrumb_path_category_ids.as_deref(),
        row.seller_id_mode.as_deref(),
        row.image_url.as_deref(),
    )
}

/// Keep exactly one row per business key, ordered by key.
///
/// Among candidates the greatest breadcrumb wins, then the greatest
/// `seller_id_mode`, then the greatest `image_url`. Exact ties keep the
/// earliest row in input order.
pub fn select_representatives(target: ExpansionTarget, rows: Vec<WideRow>) -> Vec<WideRow> {
    let mut chosen: BTreeMap<GroupKey, WideRow> = BTreeMap::new();
    for row in rows {
        let key = GroupKey::of(target, &row);
        match chosen.get(&key) {
            Some(current) if tie_break(&row) <= tie_break(current) => {}
            _ => {
                chosen.insert(key, row);
            }
        }
    }
    chosen.into_values().collect()
}

/// One distinct seller of a packed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerShare {
    pub seller_id: String,
    /// Segments naming this seller
    pub segments: usize,
}

/// Seller ids emitted for one packed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerSplit {
    /// Segment count; the divisor for every metric
    pub seller_num: usize,
    /// Distinct sellers in order of first appearance
    pub sellers: Vec<SellerShare>,
    /// Empty segments dropped by [`EmptySellerPolicy::Skip`]
    pub skipped: usize,
}

/// Split `seller_id_mode` on `|`.
///
/// `seller_num` counts every segment, empty ones included, and each
/// seller receives `segments / seller_num` of every metric. A seller named
/// twice (`X|X`, or several empty segments under a placeholder) becomes a
/// single entry holding both shares, so the emitted rows stay unique per
/// seller. Segments dropped by [`EmptySellerPolicy::Skip`] keep their
/// share out of the output: for `A|` the row for `A` carries half of the
/// packed total and the `*_org` columns keep the full value. A missing
/// value counts as one empty segment.
pub fn split_sellers(mode: Option<&str>, policy: &EmptySellerPolicy) -> SellerSplit {
    let segments: Vec<&str> = mode.unwrap_or("").split(VALUE_SEPARATOR).collect();
    let mut sellers: Vec<SellerShare> = Vec::with_capacity(segments.len());
    let mut skipped = 0;

    for segment in &segments {
        let seller_id = if segment.trim().is_empty() {
            match policy {
                EmptySellerPolicy::Skip => {
                    skipped += 1;
                    continue;
                }
                EmptySellerPolicy::Placeholder(id) => id.as_str(),
            }
        } else {
            segment
        };

        match sellers.iter_mut().find(|s| s.seller_id == seller_id) {
            Some(share) => share.segments += 1,
            None => sellers.push(SellerShare {
                seller_id: seller_id.to_string(),
                segments: 1,
            }),
        }
    }

    SellerSplit {
        seller_num: segments.len(),
        sellers,
        skipped,
    }
}

/// Category levels parsed from a breadcrumb such as `1|22|333`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPath {
    /// Breadcrumb with `|` rendered as ` > `
    pub path: Option<String>,
    pub ids: [Option<i64>; CATEGORY_LEVELS],
}

impl CategoryPath {
    pub fn parse(breadcrumb: Option<&str>) -> Self {
        let Some(breadcrumb) = breadcrumb.filter(|b| !b.is_empty()) else {
            return Self::default();
        };

        let mut ids = [None; CATEGORY_LEVELS];
        for (level, segment) in breadcrumb
            .split(VALUE_SEPARATOR)
            .take(CATEGORY_LEVELS)
            .enumerate()
        {
            ids[level] = segment.trim().parse::<i64>().ok();
        }

        Self {
            path: Some(breadcrumb.replace(VALUE_SEPARATOR, " > ")),
            ids,
        }
    }
}

/// One row of `tb_data_week`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekRow {
    pub marketplace: String,
    pub root_category_id: i64,
    pub year: Option<i32>,
    pub week: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub asin: String,
    pub seller_id: String,
    pub is_available: Option<i32>,
    pub category_rank: Option<i64>,
    pub subcategory_rank: Option<i64>,
    pub price: Option<f64>,
    pub review_count: Option<i64>,
    pub ratings: Option<f64>,
    pub metrics: Metrics,
    pub metrics_org: Metrics,
    pub seller_num: i32,
}

/// One row of `tb_data_product`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub marketplace: String,
    pub root_category_id: i64,
    pub asin: String,
    pub seller_id: String,
    pub brand: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub category_path: Option<String>,
    pub category_ids: [Option<i64>; CATEGORY_LEVELS],
    pub first_date_available: Option<String>,
    pub seller_num: i32,
    pub seller_types: Option<String>,
}

/// Rows emitted for one wide row plus the count of dropped empty sellers
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

pub fn expand_week(row: &WideRow, policy: &EmptySellerPolicy) -> Expansion<WeekRow> {
    let split = split_sellers(row.seller_id_mode.as_deref(), policy);

    let rows = split
        .sellers
        .into_iter()
        .map(|share| WeekRow {
            marketplace: row.marketplace.clone(),
            root_category_id: row.root_category_id,
            year: row.year,
            week: row.week.clone(),
            start_date: row.start_date.clone(),
            end_date: row.end_date.clone(),
            asin: row.asin.clone(),
            seller_id: share.seller_id,
            is_available: row.is_available,
            category_rank: row.category_rank,
            subcategory_rank: row.subcategory_rank,
            price: row.price,
            review_count: row.review_count,
            ratings: row.ratings,
            metrics: row.metrics.apportioned(share.segments, split.seller_num),
            metrics_org: row.metrics,
            seller_num: split.seller_num as i32,
        })
        .collect();

    Expansion {
        rows,
        skipped: split.skipped,
    }
}

pub fn expand_product(row: &WideRow, policy: &EmptySellerPolicy) -> Expansion<ProductRow> {
    let split = split_sellers(row.seller_id_mode.as_deref(), policy);
    let category = CategoryPath::parse(row.breadcrumb_path_category_ids.as_deref());

    let rows = split
        .sellers
        .into_iter()
        .map(|share| ProductRow {
            marketplace: row.marketplace.clone(),
            root_category_id: row.root_category_id,
            asin: row.asin.clone(),
            seller_id: share.seller_id,
            brand: row.brand.clone(),
            name: row.name.clone(),
            image_url: row.image_url.clone(),
            category_path: category.path.clone(),
            category_ids: category.ids,
            first_date_available: row.first_date_available.clone(),
            seller_num: split.seller_num as i32,
            seller_types: row.seller_types.clone(),
        })
        .collect();

    Expansion {
        rows,
        skipped: split.skipped,
    }
}
