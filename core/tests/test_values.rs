// Value rendering: query parameters, display text and JSON.

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use chlite_core::prelude::*;
    use chlite_core::query::render_param;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

// # ✅ Top-level parameters

    #[test]
    fn scalars_render_bare() {
        assert_eq!(render_param(&Value::Null), "NULL");
        assert_eq!(render_param(&Value::from(true)), "1");
        assert_eq!(render_param(&Value::from(false)), "0");
        assert_eq!(render_param(&Value::from(-42i64)), "-42");
        assert_eq!(render_param(&Value::from(1.5f64)), "1.5");
        assert_eq!(render_param(&Value::from("it's")), "it's");
    }

    #[test]
    fn temporal_and_decimal_params() {
        assert_eq!(render_param(&Value::from(date(2024, 3, 1))), "2024-03-01");
        let at = date(2024, 12, 14).and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(render_param(&Value::from(at)), "2024-12-14 10:00:00");
        assert_eq!(render_param(&Value::from(Decimal::new(1999, 2))), "19.99");
        assert_eq!(render_param(&Value::from(Ipv4Addr::new(10, 0, 0, 1))), "10.0.0.1");
    }

    #[test]
    fn optional_binds_to_null() {
        assert_eq!(render_param(&Value::from(None::<u32>)), "NULL");
        assert_eq!(render_param(&Value::from(Some(3u32))), "3");
    }

// # ✅ Nested parameters

    #[test]
    fn arrays_quote_strings() {
        assert_eq!(render_param(&Value::from(vec!["a", "b"])), "['a','b']");
        assert_eq!(render_param(&Value::from(vec![1u8, 2, 3])), "[1,2,3]");
        assert_eq!(render_param(&Value::Array(vec![])), "[]");
    }

    #[test]
    fn nested_literals_use_lowercase_keywords() {
        let v = Value::Array(vec![Value::Null, Value::Bool(true), Value::Bool(false)]);
        assert_eq!(render_param(&v), "[null,true,false]");
    }

    #[test]
    fn nested_quotes_are_escaped() {
        let v = Value::from(vec!["it's", r"back\slash"]);
        assert_eq!(render_param(&v), r"['it\'s','back\\slash']");
    }

    #[test]
    fn tuples_maps_and_dates() {
        let tuple = Value::Tuple(vec![Value::from(1u8), Value::from("x")]);
        assert_eq!(render_param(&tuple), "(1,'x')");

        let map = Value::Map(vec![(Value::from("k"), Value::from(1u8))]);
        assert_eq!(render_param(&map), "{'k':1}");

        let dates = Value::from(vec![date(2024, 1, 2)]);
        assert_eq!(render_param(&dates), "['2024-01-02']");

        let nested = Value::Array(vec![Value::from(vec![1u8]), Value::Array(vec![])]);
        assert_eq!(render_param(&nested), "[[1],[]]");
    }

// # ✅ Display and JSON

    #[test]
    fn display_text() {
        assert_eq!(Value::Uuid(Uuid::from_bytes([0x11; 16])).to_string(), "11111111-1111-1111-1111-111111111111");
        assert_eq!(Value::from(Decimal256::from_i128(-12345, 2)).to_string(), "-123.45");
        assert_eq!(Value::Enum { label: "red".into(), code: 1 }.to_string(), "red");
        let map = Value::Map(vec![(Value::from("a"), Value::Array(vec![Value::from(1u8), Value::Null]))]);
        assert_eq!(map.to_string(), "{a:[1,NULL]}");
    }

    #[test]
    fn json_shapes() {
        let row = Value::Tuple(vec![
            Value::Null,
            Value::UInt64(7),
            Value::UInt128(u128::MAX),
            Value::Int128(-3),
            Value::from(date(2024, 3, 1)),
            Value::from(Decimal::new(-5, 4)),
            Value::Map(vec![(Value::UInt8(1), Value::from("one"))]),
            Value::Json(json!({"a": [1, 2]})),
        ]);
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!([
                null,
                7,
                "340282366920938463463374607431768211455",
                -3,
                "2024-03-01",
                "-0.0005",
                {"1": "one"},
                {"a": [1, 2]}
            ])
        );
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(Decimal::new(150, 2)).as_f64(), Some(1.5));
        assert_eq!(Value::Enum { label: "x".into(), code: 2 }.as_str(), Some("x"));

        let map = Value::Map(vec![(Value::from("k"), Value::from(9u16))]);
        assert_eq!(map.get(&Value::from("k")), Some(&Value::UInt16(9)));
        assert_eq!(map.get(&Value::from("missing")), None);
    }
}
