mod common;

use census_rs::{CensusError, Dataset, Geography, Query};
use common::{StubTransport, client};
use std::sync::Arc;

/// Every case must fail before any request leaves the client.
fn assert_rejected_offline(q: Query) {
    let stub = Arc::new(StubTransport::new().route("", 200, "[]"));
    let c = client(&stub);
    let err = c.fetch(&q).unwrap_err();
    assert!(
        matches!(err, CensusError::Validation(_)),
        "expected validation error, got {err:?}"
    );
    assert!(c.plan(&q).is_err());
    assert_eq!(stub.calls(), 0, "no request may be sent for {q:?}");
}

#[test]
fn tract_without_state_fails_locally() {
    assert_rejected_offline(Query::new(Dataset::Acs5, 2019, Geography::Tract).variable("B01003_001"));
}

#[test]
fn table_and_variables_together_fail_locally() {
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .table("B19001"),
    );
}

#[test]
fn empty_request_fails_locally() {
    assert_rejected_offline(Query::new(Dataset::Acs5, 2019, Geography::State));
    assert_rejected_offline(Query::new(Dataset::Acs5, 2019, Geography::State).variable("  "));
    assert_rejected_offline(Query::new(Dataset::Acs5, 2019, Geography::State).table(" "));
}

#[test]
fn duplicate_variable_fails_locally() {
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::State).variables(["B01003_001", "B01003_001"]),
    );
}

#[test]
fn geography_outside_dataset_fails_locally() {
    // ACS 1-year does not publish tracts.
    assert_rejected_offline(
        Query::new(Dataset::Acs1, 2019, Geography::Tract)
            .state("CA")
            .variable("B01003_001"),
    );
    assert_rejected_offline(Query::new(Dataset::Flows, 2018, Geography::State).variable("MOVEDIN"));
}

#[test]
fn unpublished_year_fails_locally() {
    assert_rejected_offline(Query::new(Dataset::Acs1, 2020, Geography::State).variable("B01003_001"));
    assert_rejected_offline(
        Query::new(Dataset::DecennialPl, 2015, Geography::State).variable("P1_001N"),
    );
}

#[test]
fn bad_filters_fail_locally() {
    // Unknown state.
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::County)
            .state("Atlantis")
            .variable("B01003_001"),
    );
    // Filter the level does not accept.
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::Us)
            .state("CA")
            .variable("B01003_001"),
    );
    // County without a state.
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::County)
            .county("037")
            .variable("B01003_001"),
    );
    // Five-digit county from another state.
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::Tract)
            .state("CA")
            .county("41051")
            .variable("B01003_001"),
    );
}

#[test]
fn alias_problems_fail_locally() {
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::State)
            .variables(["B01003_001", "B19013_001"])
            .alias("x", "B01003_001")
            .alias("x", "B19013_001"),
    );
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .alias("income", "B19013_001"),
    );
}

#[test]
fn undeclared_breakdown_fails_locally() {
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .breakdown("SEX"),
    );
}

#[test]
fn alias_outside_expanded_table_is_rejected_before_data_request() {
    let stub = Arc::new(
        StubTransport::new()
            .route("variables.json", 200, common::acs_catalog(&["B19001_001", "B19001_002"]))
            .route("acs/acs5?", 200, "[]"),
    );
    let q = Query::new(Dataset::Acs5, 2019, Geography::State)
        .table("B19001")
        .alias("pop", "B01003_001");

    let err = client(&stub).fetch(&q).unwrap_err();
    assert!(matches!(err, CensusError::Validation(_)));
    assert_eq!(stub.calls_matching("variables.json"), 1);
    assert_eq!(stub.calls_matching("acs/acs5?"), 0);
}

#[test]
fn alias_reusing_another_code_fails_locally() {
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::State)
            .variables(["B01003_001", "B19013_001"])
            .alias("B01003_001", "B19013_001"),
    );
}

#[test]
fn alias_naming_a_fixed_column_fails_locally() {
    for reserved in ["id", "name"] {
        assert_rejected_offline(
            Query::new(Dataset::DecennialPl, 2020, Geography::State)
                .variable("P1_001N")
                .alias(reserved, "P1_001N"),
        );
    }
    assert_rejected_offline(
        Query::new(Dataset::EstimatesCharacteristics, 2019, Geography::State)
            .variable("POP")
            .breakdown("SEX")
            .alias("SEX", "POP"),
    );
}

#[test]
fn padded_duplicate_code_fails_locally() {
    assert_rejected_offline(
        Query::new(Dataset::Acs5, 2019, Geography::State).variables(["B01003_001", " B01003_001"]),
    );
}

#[test]
fn padded_code_accepts_alias_and_goes_out_trimmed() {
    let stub = Arc::new(StubTransport::new().route("", 200, "[]"));
    let q = Query::new(Dataset::Acs5, 2019, Geography::State)
        .variable(" B01003_001 ")
        .alias("pop", "B01003_001");

    let plan = client(&stub).show_call(&q).unwrap();
    assert_eq!(plan.len(), 1);
    assert!(plan[0].contains("get=NAME,B01003_001E,B01003_001M&"));
    assert_eq!(stub.calls(), 0);
}

#[test]
fn alias_clashing_inside_expanded_table_is_rejected_before_data_request() {
    let stub = Arc::new(
        StubTransport::new()
            .route("variables.json", 200, common::acs_catalog(&["B19001_001", "B19001_002"]))
            .route("acs/acs5?", 200, "[]"),
    );
    let q = Query::new(Dataset::Acs5, 2019, Geography::State)
        .table("B19001")
        .alias("B19001_002", "B19001_001");

    let err = client(&stub).fetch(&q).unwrap_err();
    assert!(matches!(err, CensusError::Validation(_)));
    assert_eq!(stub.calls_matching("acs/acs5?"), 0);
}
