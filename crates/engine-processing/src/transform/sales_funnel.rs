use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use serde_json::Value as Json;

pub const KEY: &[&str] = &["nmid", "periodstart", "periodend"];

/// Per-product funnel for one period: card opens, carts, orders, buyouts.
pub struct SalesFunnel {
    table: String,
}

impl SalesFunnel {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Transformer for SalesFunnel {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn normalize(&self, record: &Json, ctx: &TransformContext) -> Option<RowData> {
        let product = |field: &'static str| ["product", field];
        let selected = |field: &'static str| ["statistic", "selected", field];

        let nmid = coerce::int_key(record, &product("nmId"))?;
        let start = coerce::date(record, &["statistic", "selected", "period", "start"])
            .unwrap_or(ctx.window.start());
        let end = coerce::date(record, &["statistic", "selected", "period", "end"])
            .unwrap_or(ctx.window.end());

        let open = coerce::count(record, &selected("openCount"));
        let cart = coerce::count(record, &selected("cartCount"));
        let orders = coerce::count(record, &selected("orderCount"));
        let buyouts = coerce::count(record, &selected("buyoutCount"));

        Some(
            row(&self.table)
                .with("nmid", nmid)
                .with("periodstart", start)
                .with("periodend", end)
                .with("reportdate", (start == end).then_some(start))
                .with("title", coerce::text(record, &product("title")))
                .with("vendorcode", coerce::text(record, &product("vendorCode")))
                .with("brandname", coerce::text(record, &product("brandName")))
                .with("subjectid", coerce::int_key(record, &product("subjectId")))
                .with("subjectname", coerce::text(record, &product("subjectName")))
                .with(
                    "feedbackrating",
                    coerce::optional_amount(record, &product("feedbackRating")),
                )
                .with("stockswb", coerce::count(record, &["product", "stocks", "wb"]))
                .with("opencount", open)
                .with("cartcount", cart)
                .with("ordercount", orders)
                .with("buyoutcount", buyouts)
                .with("cancelcount", coerce::count(record, &selected("cancelCount")))
                .with("ordersum", coerce::amount(record, &selected("orderSum")))
                .with("buyoutsum", coerce::amount(record, &selected("buyoutSum")))
                .with("cancelsum", coerce::amount(record, &selected("cancelSum")))
                .with("avgprice", coerce::amount(record, &selected("avgPrice")))
                .with(
                    "localizationpercent",
                    coerce::amount(record, &selected("localizationPercent")),
                )
                .with(
                    "timetoreadydays",
                    coerce::count(record, &["statistic", "selected", "timeToReady", "days"]),
                )
                .with(
                    "timetoreadyhours",
                    coerce::count(record, &["statistic", "selected", "timeToReady", "hours"]),
                )
                .with("cart_conversion", coerce::percent(cart, open))
                .with("order_conversion", coerce::percent(orders, cart))
                .with("buyout_percent", coerce::percent(buyouts, orders)),
        )
    }
}
