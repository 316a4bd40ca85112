use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use serde_json::Value as Json;

pub const KEY: &[&str] = &["subject_id"];

/// Weekly reference data: commission rates per product category.
pub struct TariffsCommission {
    table: String,
}

impl TariffsCommission {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Transformer for TariffsCommission {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
        let subject_id = coerce::int_key(record, &["subjectID"])
            .or_else(|| coerce::int_key(record, &["subjectId"]))?;

        Some(
            row(&self.table)
                .with("subject_id", subject_id)
                .with("subject_name", coerce::text(record, &["subjectName"]))
                .with("parent_name", coerce::text(record, &["parentName"]))
                .with(
                    "kgvp_marketplace",
                    coerce::optional_amount(record, &["kgvpMarketplace"]),
                )
                .with(
                    "paid_storage_kgvp",
                    coerce::optional_amount(record, &["paidStorageKgvp"]),
                ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::core::{value::Value, window::FetchWindow};
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn optional_rates_stay_null() {
        let ctx = TransformContext::new(FetchWindow::single_day(
            NaiveDate::from_ymd_opt(2026, 1, 18).unwrap(),
        ));
        let transformer = TariffsCommission::new("wb_tariffs_commission");
        let row = transformer
            .normalize(
                &json!({ "subjectID": 55, "subjectName": "Чайники", "kgvpMarketplace": 24.5 }),
                &ctx,
            )
            .unwrap();

        assert_eq!(row.get_value("subject_id"), Value::Int(55));
        assert_eq!(
            row.get_value("kgvp_marketplace"),
            Value::Decimal(Decimal::new(2450, 2))
        );
        assert_eq!(row.get_value("paid_storage_kgvp"), Value::Null);
        assert!(transformer.normalize(&json!({ "subjectName": "x" }), &ctx).is_none());
    }
}
