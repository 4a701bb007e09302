// Type string parser: structure, totality, error positions and idempotence.

#[cfg(test)]
mod tests {
    use chlite_core::schema::{parse_type, EnumVariants, TypeCache, TypeDescriptor as T};
    use proptest::prelude::*;

    fn parse(s: &str) -> T {
        parse_type(s).unwrap_or_else(|e| panic!("{s}: {e}"))
    }

// # ✅ Structure

    #[test]
    fn nested_containers() {
        assert_eq!(
            parse("Array(Nullable(String))"),
            T::Array(Box::new(T::Nullable(Box::new(T::String))))
        );
        assert_eq!(
            parse("Map(String, LowCardinality(String))"),
            T::Map(Box::new(T::String), Box::new(T::LowCardinality(Box::new(T::String))))
        );
    }

    #[test]
    fn parameterized_leaves() {
        assert_eq!(parse("Decimal(18,4)"), T::Decimal { precision: 18, scale: 4 });
        assert_eq!(parse("Decimal64(3)"), T::Decimal { precision: 18, scale: 3 });
        assert_eq!(parse("FixedString(16)"), T::FixedString(16));
        assert_eq!(parse("DateTime"), T::DateTime { timezone: None });
        assert_eq!(
            parse("DateTime('Europe/Berlin')"),
            T::DateTime { timezone: Some("Europe/Berlin".into()) }
        );
        assert_eq!(
            parse("DateTime64(3, 'UTC')"),
            T::DateTime64 { precision: 3, timezone: Some("UTC".into()) }
        );
        assert_eq!(parse("DateTime64(6)"), T::DateTime64 { precision: 6, timezone: None });
        assert_eq!(parse("Boolean"), T::Bool);
    }

    #[test]
    fn enums_keep_declared_order() {
        let expected = EnumVariants::new(vec![("a".into(), 1), ("b".into(), 2)]);
        assert_eq!(parse("Enum8('a'=1,'b'=2)"), T::Enum8(expected));

        let T::Enum16(v) = parse("Enum16('neg' = -300, 'it''s' = 7)") else { panic!() };
        assert_eq!(v.label(-300), Some("neg"));
        assert_eq!(v.label(7), Some("it's"));
    }

    #[test]
    fn tuples_named_and_unnamed() {
        assert_eq!(
            parse("Tuple(UInt8, String)"),
            T::Tuple { elements: vec![T::UInt8, T::String], names: None }
        );
        assert_eq!(
            parse("Tuple(id UInt64, tags Array(String))"),
            T::Tuple {
                elements: vec![T::UInt64, T::Array(Box::new(T::String))],
                names: Some(vec!["id".into(), "tags".into()]),
            }
        );
    }

    #[test]
    fn backtick_element_names() {
        let ty = parse("Tuple(`a b` String, `it``s` UInt8, plain Date)");
        assert_eq!(
            ty,
            T::Tuple {
                elements: vec![T::String, T::UInt8, T::Date],
                names: Some(vec!["a b".into(), "it`s".into(), "plain".into()]),
            }
        );
        assert_eq!(ty.to_string(), "Tuple(`a b` String, `it\\`s` UInt8, plain Date)");
        assert_eq!(parse(&ty.to_string()), ty);

        let err = parse_type("Tuple(`open String)").unwrap_err();
        assert_eq!(err.position, 6);
    }

    #[test]
    fn whitespace_is_insignificant() {
        assert_eq!(parse(" Map( String ,UInt8 ) "), parse("Map(String, UInt8)"));
    }

// # ✅ Failures

    #[test]
    fn unknown_leaf_is_rejected() {
        let err = parse_type("Array(Strin)").unwrap_err();
        assert_eq!(err.input, "Array(Strin)");
        assert_eq!(err.position, 6);
        assert!(err.reason.contains("Strin"));
    }

    #[test]
    fn parameter_count_mismatch() {
        assert!(parse_type("Map(String)").is_err());
        assert!(parse_type("Nullable(String, UInt8)").is_err());
        assert!(parse_type("Array()").is_err());
        assert!(parse_type("Decimal(18)").is_err());
        assert!(parse_type("UInt8(3)").is_err());
    }

    #[test]
    fn trailing_input_is_rejected() {
        let err = parse_type("String)").unwrap_err();
        assert_eq!(err.position, 6);
        assert!(parse_type("UInt8 UInt8").is_err());
        assert!(parse_type("Array(String").is_err());
    }

    #[test]
    fn out_of_range_parameters() {
        assert!(parse_type("Enum8('x' = 200)").is_err());
        assert!(parse_type("DateTime64(10)").is_err());
        assert!(parse_type("Decimal(5, 6)").is_err());
        assert!(parse_type("Decimal(77, 0)").is_err());
        assert!(parse_type("FixedString(0)").is_err());
    }

    #[test]
    fn empty_and_garbage_input() {
        assert!(parse_type("").is_err());
        assert!(parse_type("()").is_err());
        assert!(parse_type("'String'").is_err());
    }

// # ✅ Cache

    #[test]
    fn cache_hands_out_shared_descriptors() {
        let mut cache = TypeCache::new();
        let a = cache.resolve("LowCardinality(String)").unwrap();
        let b = cache.resolve("LowCardinality(String)").unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(cache.hits(), 1);
    }

// # ✅ Properties

    fn leaf() -> impl Strategy<Value = T> {
        prop_oneof![
            Just(T::Bool),
            Just(T::UInt8),
            Just(T::Int64),
            Just(T::UInt256),
            Just(T::Float64),
            Just(T::String),
            Just(T::Uuid),
            Just(T::Date32),
            Just(T::Ipv6),
            (1usize..64).prop_map(T::FixedString),
            (1u8..=76).prop_flat_map(|p| (Just(p), 0..=p))
                .prop_map(|(precision, scale)| T::Decimal { precision, scale }),
            (0u8..=9, proptest::option::of("[A-Za-z/_]{1,12}"))
                .prop_map(|(precision, timezone)| T::DateTime64 { precision, timezone }),
            proptest::collection::vec(("[a-z' ]{1,6}", -128i16..128), 1..4)
                .prop_map(|v| T::Enum8(EnumVariants::new(v))),
        ]
    }

    fn descriptor() -> impl Strategy<Value = T> {
        leaf().prop_recursive(4, 24, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(|t| T::Nullable(Box::new(t))),
                inner.clone().prop_map(|t| T::Array(Box::new(t))),
                inner.clone().prop_map(|t| T::LowCardinality(Box::new(t))),
                (inner.clone(), inner.clone()).prop_map(|(k, v)| T::Map(Box::new(k), Box::new(v))),
                proptest::collection::vec(inner.clone(), 1..4)
                    .prop_map(|elements| T::Tuple { elements, names: None }),
                proptest::collection::vec((inner, "[a-z_` ]{1,5}"), 1..4).prop_map(|named| {
                    let (elements, names) = named.into_iter().unzip();
                    T::Tuple { elements, names: Some(names) }
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(ty in descriptor()) {
            let text = ty.to_string();
            let parsed = parse_type(&text);
            prop_assert_eq!(parsed.as_ref(), Ok(&ty), "{}", text);
        }

        #[test]
        fn prop_parse_is_idempotent(ty in descriptor()) {
            let text = ty.to_string();
            prop_assert_eq!(parse_type(&text), parse_type(&text));
        }

        #[test]
        fn prop_parse_is_total(input in "[A-Za-z0-9(),'` =]{0,24}") {
            // Either a full parse or an error positioned inside the input.
            match parse_type(&input) {
                Ok(ty) => prop_assert_eq!(parse_type(&ty.to_string()), Ok(ty)),
                Err(e) => prop_assert!(e.position <= input.len()),
            }
        }
    }
}
