//! Batch lookup of representative soil properties.

use std::collections::BTreeMap;

use soil_map_analysis_models::{MapUnitKey, SoilProperties};
use soil_map_query::{ExecuteOptions, QueryError, QueryExecutor, cell_f64, cell_str};

use crate::queries::{self, columns};

/// Fetches one [`SoilProperties`] record per map unit in `keys`.
///
/// Keys the service has no major component for are simply absent from the
/// returned map. An empty key list returns an empty map without a query.
///
/// # Errors
///
/// Propagates the executor's [`QueryError`] unchanged.
pub async fn fetch_properties(
    executor: &QueryExecutor,
    keys: &[MapUnitKey],
    options: &ExecuteOptions,
) -> Result<BTreeMap<MapUnitKey, SoilProperties>, QueryError> {
    if keys.is_empty() {
        return Ok(BTreeMap::new());
    }

    let Some(query) = queries::soil_properties(keys) else {
        return Ok(BTreeMap::new());
    };

    let rows = executor.execute(&query, options).await?;

    let mut properties = BTreeMap::new();
    for row in &rows {
        let Some(record) = properties_from_row(row) else {
            log::debug!("Skipping property row without a map unit key");
            continue;
        };
        properties.entry(record.mukey.clone()).or_insert(record);
    }

    log::debug!(
        "Fetched properties for {}/{} map units",
        properties.len(),
        keys.len()
    );

    Ok(properties)
}

fn properties_from_row(row: &[serde_json::Value]) -> Option<SoilProperties> {
    let mukey = MapUnitKey::new(cell_str(row, columns::MUKEY)?);

    Some(SoilProperties {
        mukey,
        map_unit_name: cell_str(row, columns::MUNAME),
        component_name: cell_str(row, columns::COMPNAME),
        component_percent: cell_f64(row, columns::COMPPCT_R),
        taxonomic_order: cell_str(row, columns::TAXORDER),
        taxonomic_suborder: cell_str(row, columns::TAXSUBORDER),
        drainage_class: cell_str(row, columns::DRAINAGECL),
        reaction_class: cell_str(row, columns::TAXREACTION),
        texture: cell_str(row, columns::TEXDESC),
        ph: cell_f64(row, columns::PH1TO1H2O_R),
        organic_matter_pct: cell_f64(row, columns::OM_R),
        sand_pct: cell_f64(row, columns::SANDTOTAL_R),
        silt_pct: cell_f64(row, columns::SILTTOTAL_R),
        clay_pct: cell_f64(row, columns::CLAYTOTAL_R),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::test_support::{FakeSoilService, property_row};

    #[tokio::test]
    async fn empty_key_list_issues_no_query() {
        let service = Arc::new(FakeSoilService::default());
        let executor = QueryExecutor::new(service.clone());

        let props = fetch_properties(&executor, &[], &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(props.is_empty());
        assert!(service.queries().is_empty());
    }

    #[tokio::test]
    async fn decodes_rows_and_keeps_first_per_key() {
        let mut duplicate = property_row("123456");
        duplicate[2] = json!("Second");
        let service = Arc::new(
            FakeSoilService::default().with_properties(vec![property_row("123456"), duplicate]),
        );
        let executor = QueryExecutor::new(service);

        let props = fetch_properties(
            &executor,
            &[MapUnitKey::from("123456"), MapUnitKey::from("999")],
            &ExecuteOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(props.len(), 1);
        let record = &props[&MapUnitKey::from("123456")];
        assert_eq!(record.component_name.as_deref(), Some("Clarion"));
        assert_eq!(record.taxonomic_order.as_deref(), Some("Mollisols"));
        assert_eq!(record.ph, Some(6.2));
        assert_eq!(record.clay_pct, Some(22.0));
        assert!(!props.contains_key(&MapUnitKey::from("999")));
    }

    #[tokio::test]
    async fn query_failure_propagates() {
        let service = Arc::new(FakeSoilService::default().failing_properties());
        let executor = QueryExecutor::new(service);
        let options = ExecuteOptions {
            max_retries: 1,
            ..ExecuteOptions::default()
        };

        let err = fetch_properties(&executor, &[MapUnitKey::from("1")], &options)
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Execution { status: Some(500), .. }));
    }
}
