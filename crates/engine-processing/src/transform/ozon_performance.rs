use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use serde_json::Value as Json;

pub const KEY: &[&str] = &["campaign_id", "date", "sku"];

/// Columns of the per-campaign statistics CSV.
mod header {
    pub const DAY: &str = "День";
    pub const PRODUCT: &str = "Название товара";
    pub const PRICE: &str = "Цена товара, ₽";
    pub const VIEWS: &str = "Показы";
    pub const CLICKS: &str = "Клики";
    pub const CTR: &str = "CTR (%)";
    pub const TO_CART: &str = "В корзину";
    pub const AVG_CPC: &str = "Средняя стоимость клика, ₽";
    pub const SPEND: &str = "Расход, ₽, с НДС";
    pub const ORDERS: &str = "Заказы";
    pub const REVENUE: &str = "Продажи, ₽";
    pub const MODEL_ORDERS: &str = "Заказы модели";
    pub const MODEL_REVENUE: &str = "Продажи с заказов модели, ₽";
    pub const DRR: &str = "ДРР, %";
    pub const ADDED: &str = "Дата добавления";
}

/// Daily advertising statistics per campaign and SKU.
///
/// Direct and model-attributed conversions go to separate columns and are
/// never summed.
pub struct OzonPerformance {
    table: String,
}

impl OzonPerformance {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Transformer for OzonPerformance {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
        let amount = |column: &'static str| coerce::amount(record, &[column]);
        let count = |column: &'static str| coerce::count(record, &[column]);

        Some(
            row(&self.table)
                .with("campaign_id", coerce::int_key(record, &["campaign_id"])?)
                .with("date", coerce::date(record, &[header::DAY])?)
                .with("sku", coerce::int_key(record, &["sku"])?)
                .with("product_name", coerce::text(record, &[header::PRODUCT]))
                .with("price", amount(header::PRICE))
                .with("views", count(header::VIEWS))
                .with("clicks", count(header::CLICKS))
                .with("ctr", amount(header::CTR))
                .with("to_cart", count(header::TO_CART))
                .with("avg_cpc", amount(header::AVG_CPC))
                .with("spend", amount(header::SPEND))
                .with("orders", count(header::ORDERS))
                .with("revenue", amount(header::REVENUE))
                .with("model_orders", count(header::MODEL_ORDERS))
                .with("model_revenue", amount(header::MODEL_REVENUE))
                .with("drr", amount(header::DRR))
                .with("added_at", coerce::date(record, &[header::ADDED])),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use connectors::ozon::report::decode_report;
    use model::core::{value::Value, window::FetchWindow};
    use rust_decimal::Decimal;

    const REPORT: &str = "Кампания по продвижению товаров № 20476484, период 11.01.2026-18.01.2026\n\
День;sku;Название товара;Цена товара, ₽;Показы;Клики;CTR (%);В корзину;Средняя стоимость клика, ₽;Расход, ₽, с НДС;Заказы;Продажи, ₽;Заказы модели;Продажи с заказов модели, ₽;ДРР, %;Дата добавления\n\
17.01.2026;555;Чайник;2 490,00;1 200;35;2,92;6;11,73;410,50;2;4 980,00;1;2 490,00;8,24;02.12.2025\n\
Всего;;;;1 200;35;;6;;410,50;2;4 980,00;1;2 490,00;;\n";

    #[test]
    fn report_rows_keep_direct_and_model_conversions_apart() {
        let reports = decode_report(REPORT.as_bytes()).unwrap();
        let ctx = TransformContext::new(FetchWindow::single_day(
            NaiveDate::from_ymd_opt(2026, 1, 17).unwrap(),
        ));
        let transformer = OzonPerformance::new("ozon_campaign_product_stats");

        let rows: Vec<_> = reports[0]
            .rows
            .iter()
            .filter_map(|r| transformer.normalize(r, &ctx))
            .collect();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.get_value("campaign_id"), Value::Int(20476484));
        assert_eq!(row.get_value("sku"), Value::Int(555));
        assert_eq!(row.get_value("views"), Value::Int(1200));
        assert_eq!(row.get_value("orders"), Value::Int(2));
        assert_eq!(row.get_value("model_orders"), Value::Int(1));
        assert_eq!(row.get_value("revenue"), Value::Decimal(Decimal::new(498000, 2)));
        assert_eq!(
            row.get_value("model_revenue"),
            Value::Decimal(Decimal::new(249000, 2))
        );
        assert_eq!(
            row.get_value("added_at"),
            Value::Date(NaiveDate::from_ymd_opt(2025, 12, 2).unwrap())
        );
    }
}
