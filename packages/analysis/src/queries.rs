//! T-SQL text for the three Soil Data Access query shapes.
//!
//! Map unit keys are interpolated into the query text, so only
//! [well-formed](MapUnitKey::is_well_formed) keys are accepted.

use soil_map_analysis_models::MapUnitKey;

/// Column order of [`soil_properties`] rows.
pub mod columns {
    pub const MUKEY: usize = 0;
    pub const MUNAME: usize = 1;
    pub const COMPNAME: usize = 2;
    pub const COMPPCT_R: usize = 3;
    pub const TAXORDER: usize = 4;
    pub const TAXSUBORDER: usize = 5;
    pub const DRAINAGECL: usize = 6;
    pub const TAXREACTION: usize = 7;
    pub const TEXDESC: usize = 8;
    pub const PH1TO1H2O_R: usize = 9;
    pub const OM_R: usize = 10;
    pub const SANDTOTAL_R: usize = 11;
    pub const SILTTOTAL_R: usize = 12;
    pub const CLAYTOTAL_R: usize = 13;
}

/// Map units whose polygons intersect the WGS84 geometry `wkt`.
///
/// One row per unit, `mukey` in the first column.
#[must_use]
pub fn mapunit_keys_for_wkt(wkt: &str) -> String {
    format!(
        "SELECT DISTINCT mukey FROM SDA_Get_Mukey_from_intersection_with_WktWgs84('{}')",
        wkt.replace('\'', "''")
    )
}

/// Representative properties for each of `keys`.
///
/// Within each map unit, major components are ranked by component
/// percentage (highest first) and then horizon top depth (shallowest
/// first); only the top-ranked row is kept. Returns `None` when no key is
/// well formed.
#[must_use]
pub fn soil_properties(keys: &[MapUnitKey]) -> Option<String> {
    let list = key_list(keys)?;

    Some(format!(
        "SELECT mukey, muname, compname, comppct_r, taxorder, taxsuborder, \
                drainagecl, taxreaction, texdesc, ph1to1h2o_r, om_r, \
                sandtotal_r, silttotal_r, claytotal_r \
         FROM ( \
           SELECT mu.mukey, mu.muname, c.compname, c.comppct_r, c.taxorder, \
                  c.taxsuborder, c.drainagecl, c.taxreaction, tg.texdesc, \
                  ch.ph1to1h2o_r, ch.om_r, ch.sandtotal_r, ch.silttotal_r, \
                  ch.claytotal_r, \
                  ROW_NUMBER() OVER ( \
                    PARTITION BY mu.mukey \
                    ORDER BY c.comppct_r DESC, ch.hzdept_r ASC \
                  ) AS rn \
           FROM mapunit mu \
           INNER JOIN component c ON c.mukey = mu.mukey AND c.majcompflag = 'Yes' \
           LEFT JOIN chorizon ch ON ch.cokey = c.cokey \
           LEFT JOIN chtexturegrp tg ON tg.chkey = ch.chkey AND tg.rvindicator = 'Yes' \
           WHERE mu.mukey IN ({list}) \
         ) ranked \
         WHERE rn = 1"
    ))
}

/// Polygon WKT (WGS84) of every polygon of map unit `key`.
///
/// Returns `None` for a malformed key.
#[must_use]
pub fn mapunit_polygons(key: &MapUnitKey) -> Option<String> {
    if !key.is_well_formed() {
        log::warn!("Refusing to query polygons for malformed map unit key {key:?}");
        return None;
    }
    Some(format!(
        "SELECT mupolygongeo FROM SDA_Get_MupolygonWktWgs84_from_Mukey('{key}')"
    ))
}

fn key_list(keys: &[MapUnitKey]) -> Option<String> {
    let valid: Vec<String> = keys
        .iter()
        .filter(|key| {
            let ok = key.is_well_formed();
            if !ok {
                log::warn!("Dropping malformed map unit key {key:?}");
            }
            ok
        })
        .map(|key| format!("'{key}'"))
        .collect();

    (!valid.is_empty()).then(|| valid.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_in_wkt() {
        let query = mapunit_keys_for_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0))'--");
        assert_eq!(
            query,
            "SELECT DISTINCT mukey FROM SDA_Get_Mukey_from_intersection_with_WktWgs84(\
             'POLYGON ((0 0, 1 0, 1 1, 0 0))''--')"
        );
    }

    #[test]
    fn property_query_lists_valid_keys_only() {
        let keys = vec![
            MapUnitKey::from("123456"),
            MapUnitKey::from("1; DROP TABLE mapunit"),
            MapUnitKey::from("789"),
        ];
        let query = soil_properties(&keys).unwrap();

        assert!(query.contains("WHERE mu.mukey IN ('123456','789')"));
        assert!(query.contains("c.majcompflag = 'Yes'"));
        assert!(query.contains("ORDER BY c.comppct_r DESC, ch.hzdept_r ASC"));
        assert!(query.contains("WHERE rn = 1"));
        assert!(!query.contains("DROP"));
    }

    #[test]
    fn property_query_needs_a_valid_key() {
        assert!(soil_properties(&[]).is_none());
        assert!(soil_properties(&[MapUnitKey::from("abc")]).is_none());
    }

    #[test]
    fn polygon_query() {
        assert_eq!(
            mapunit_polygons(&MapUnitKey::from("123456")).as_deref(),
            Some("SELECT mupolygongeo FROM SDA_Get_MupolygonWktWgs84_from_Mukey('123456')")
        );
        assert!(mapunit_polygons(&MapUnitKey::from("12'3")).is_none());
    }
}
