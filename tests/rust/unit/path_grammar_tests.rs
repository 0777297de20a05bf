//! Unit tests for relationship path parsing edge cases and error handling
//!
//! Malformed paths must come back as errors, never panics, and well-formed
//! ones must survive printing and reparsing.

#[cfg(test)]
mod path_grammar_tests {
    use ecdbmap::relationship_path::{PathEnd, PathError, RelationshipPath};
    use ecdbmap::schema_catalog::{CatalogConfig, SchemaCatalog};
    use test_case::test_case;

    fn catalog() -> SchemaCatalog {
        CatalogConfig::from_yaml_str(include_str!("../../fixtures/test_catalog.yaml"))
            .unwrap()
            .to_catalog()
            .unwrap()
    }

    /// Malformed paths don't cause panics
    #[test]
    fn test_malformed_paths_no_panic() {
        let catalog = catalog();
        let malformed = vec![
            ".",
            "..",
            "Foo.",
            "Foo..Goo",
            "Foo.FooHasGoo",
            "Foo.FooHasGoo:2:Goo",
            "Foo.FooHasGoo:0:",
            "Foo.:0:Goo",
            "Foo.FooHasGoo:0:Goo:extra",
            "Foo.Foo:0:Goo",
            "Nope.FooHasGoo:0:Goo",
            "Foo.FooHasGoo:0:Goo bar",
            "TestSchema::Foo",
        ];

        for text in malformed {
            let result = RelationshipPath::parse(text, &catalog, Some("TestSchema"));
            assert!(result.is_err(), "'{}' should not parse", text);
        }
    }

    #[test_case("Foo.FooHasGoo:0:Goo", "TestSchema:Foo.TestSchema:FooHasGoo:0:TestSchema:Goo"; "unqualified")]
    #[test_case("ts:Foo.ts:FooHasGoo:0:ts:Goo", "TestSchema:Foo.TestSchema:FooHasGoo:0:TestSchema:Goo"; "alias")]
    #[test_case(" Goo . GooHasBar:0:Bar ", "TestSchema:Goo.TestSchema:GooHasBar:0:TestSchema:Bar"; "whitespace")]
    #[test_case(".FooHasGoo:1:Foo", ".TestSchema:FooHasGoo:1:TestSchema:Foo"; "no root")]
    #[test_case("Foo.FooHasAnything:0:AnyClass", "TestSchema:Foo.TestSchema:FooHasAnything:0:AnyClass"; "any class")]
    fn test_canonical_form(text: &str, expected: &str) {
        let catalog = catalog();
        let path = RelationshipPath::parse(text, &catalog, Some("TestSchema")).unwrap();
        assert_eq!(path.to_string(), expected);

        let reparsed = RelationshipPath::parse(&path.to_string(), &catalog, None).unwrap();
        assert_eq!(reparsed, path);
    }

    #[test]
    fn test_empty_text_is_empty_path() {
        let catalog = catalog();
        let path = RelationshipPath::parse("   ", &catalog, None).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn test_relationship_class_required_in_hop() {
        let catalog = catalog();
        assert!(matches!(
            RelationshipPath::parse("Foo.Goo:0:Bar", &catalog, Some("TestSchema")),
            Err(PathError::NotARelationship { .. })
        ));
    }

    #[test]
    fn test_init_from_string_clears_on_failure() {
        let catalog = catalog();
        let mut path = RelationshipPath::parse("Foo", &catalog, Some("TestSchema")).unwrap();
        assert!(path
            .init_from_string("Foo.FooHasGoo:7:Goo", &catalog, Some("TestSchema"))
            .is_err());
        assert!(path.is_empty());
    }

    #[test]
    fn test_reverse_then_combine_reaches_related_class() {
        let catalog = catalog();
        let to_goo =
            RelationshipPath::parse("Foo.FooHasGoo:0:Goo", &catalog, Some("TestSchema")).unwrap();
        let to_bar =
            RelationshipPath::parse("Goo.GooHasBar:0:Bar", &catalog, Some("TestSchema")).unwrap();

        let mut path = to_goo.clone();
        path.combine(&to_bar).unwrap();
        assert_eq!(path.hop_count(), to_bar.hop_count());
        assert_eq!(path.end_class(PathEnd::Leaf).unwrap().name, "Bar");
        assert!(path.is_valid(&catalog));

        let mut back = path.reversed();
        assert_eq!(back.end_class(PathEnd::Leaf).unwrap().name, "Goo");
        back.reverse();
        assert_eq!(back, path);
    }

    #[test]
    fn test_constraint_violation_is_reported() {
        let catalog = catalog();
        // GooHasBar's source end is not polymorphic
        let path =
            RelationshipPath::parse("SubGoo.GooHasBar:0:Bar", &catalog, Some("TestSchema")).unwrap();
        assert!(matches!(
            path.validate(&catalog),
            Err(PathError::ConstraintViolation { hop: 0, .. })
        ));
    }
}
