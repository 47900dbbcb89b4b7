//! Storefront analytics: raw events and the in-memory summary built from them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of products listed in `top_products`.
pub const TOP_PRODUCTS: usize = 5;

/// Longest window a summary may cover.
pub const MAX_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    View,
    Click,
    Contact,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Click => "click",
            EventKind::Contact => "contact",
        }
    }
}

/// Body of the public `POST /api/v1/analytics/events`.
#[derive(Debug, Deserialize)]
pub struct RecordEventRequest {
    pub business_id: Uuid,
    pub product_id: Option<Uuid>,
    pub kind: EventKind,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

impl SummaryQuery {
    pub fn window(&self) -> Result<i64, String> {
        match self.days {
            None => Ok(30),
            Some(d) if (1..=MAX_WINDOW_DAYS).contains(&d) => Ok(d),
            Some(_) => Err(format!("days must be between 1 and {MAX_WINDOW_DAYS}")),
        }
    }
}

/// Event row joined with the product name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub views: i64,
    pub clicks: i64,
    pub contacts: i64,
}

impl Counts {
    fn add(&mut self, kind: &str) {
        match kind {
            "view" => self.views += 1,
            "click" => self.clicks += 1,
            "contact" => self.contacts += 1,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCounts {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: Counts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductViews {
    pub product_id: Uuid,
    pub name: String,
    pub views: i64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub days: i64,
    pub totals: Counts,
    pub daily: Vec<DailyCounts>,
    pub top_products: Vec<ProductViews>,
}

/// First instant included in a window of `days` ending today.
pub fn window_start(days: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    let first_day = now.date_naive() - Duration::days(days - 1);
    first_day
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}

/// Group events into totals, a zero-filled daily series and top products.
///
/// Events outside the window are ignored.
pub fn aggregate(events: &[EventRow], days: i64, now: DateTime<Utc>) -> AnalyticsSummary {
    let today = now.date_naive();
    let first_day = today - Duration::days(days - 1);

    let mut daily: BTreeMap<NaiveDate, Counts> = (0..days)
        .map(|offset| (first_day + Duration::days(offset), Counts::default()))
        .collect();
    let mut totals = Counts::default();
    let mut views: HashMap<Uuid, (String, i64)> = HashMap::new();

    for event in events {
        let Some(bucket) = daily.get_mut(&event.created_at.date_naive()) else {
            continue;
        };
        bucket.add(&event.kind);
        totals.add(&event.kind);

        if event.kind == EventKind::View.as_str() {
            if let Some(product_id) = event.product_id {
                let entry = views.entry(product_id).or_insert_with(|| {
                    (event.product_name.clone().unwrap_or_default(), 0)
                });
                entry.1 += 1;
            }
        }
    }

    let mut top_products: Vec<ProductViews> = views
        .into_iter()
        .map(|(product_id, (name, views))| ProductViews {
            product_id,
            name,
            views,
        })
        .collect();
    top_products.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.name.cmp(&b.name)));
    top_products.truncate(TOP_PRODUCTS);

    AnalyticsSummary {
        days,
        totals,
        daily: daily
            .into_iter()
            .map(|(date, counts)| DailyCounts { date, counts })
            .collect(),
        top_products,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()
    }

    fn event(kind: &str, product: Option<(Uuid, &str)>, days_ago: i64) -> EventRow {
        EventRow {
            product_id: product.map(|(id, _)| id),
            product_name: product.map(|(_, name)| name.to_string()),
            kind: kind.to_string(),
            created_at: now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn window_defaults_and_bounds() {
        assert_eq!(SummaryQuery { days: None }.window(), Ok(30));
        assert_eq!(SummaryQuery { days: Some(7) }.window(), Ok(7));
        assert!(SummaryQuery { days: Some(0) }.window().is_err());
        assert!(SummaryQuery { days: Some(91) }.window().is_err());
    }

    #[test]
    fn window_start_is_midnight_of_first_day() {
        let start = window_start(7, now());
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn daily_series_is_zero_filled() {
        let summary = aggregate(&[], 7, now());
        assert_eq!(summary.daily.len(), 7);
        assert_eq!(summary.daily[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(summary.daily[6].date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert!(summary.daily.iter().all(|d| d.counts == Counts::default()));
        assert!(summary.top_products.is_empty());
    }

    #[test]
    fn counts_by_kind_and_day() {
        let events = vec![
            event("view", None, 0),
            event("view", None, 0),
            event("click", None, 1),
            event("contact", None, 6),
            event("view", None, 7),
        ];
        let summary = aggregate(&events, 7, now());

        assert_eq!(
            summary.totals,
            Counts {
                views: 2,
                clicks: 1,
                contacts: 1
            }
        );
        assert_eq!(summary.daily[6].counts.views, 2);
        assert_eq!(summary.daily[5].counts.clicks, 1);
        assert_eq!(summary.daily[0].counts.contacts, 1);
    }

    #[test]
    fn top_products_ranked_by_views() {
        let ids: Vec<Uuid> = (0..7).map(|_| Uuid::new_v4()).collect();
        let mut events = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let name = format!("p{i}");
            for _ in 0..=i {
                events.push(EventRow {
                    product_id: Some(*id),
                    product_name: Some(name.clone()),
                    kind: "view".into(),
                    created_at: now(),
                });
            }
        }
        events.push(event("click", Some((ids[0], "p0")), 0));

        let summary = aggregate(&events, 30, now());
        assert_eq!(summary.top_products.len(), TOP_PRODUCTS);
        assert_eq!(summary.top_products[0].name, "p6");
        assert_eq!(summary.top_products[0].views, 7);
        assert_eq!(summary.top_products[4].name, "p2");
    }
}
