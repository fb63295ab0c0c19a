//! Query construction with the two non-negotiable disciplines: only the
//! partitioned table variants are ever referenced, and every user-derived
//! value travels as a named query parameter. Projections and predicates are
//! limited to a per-table compile-time column allow-list.

use crate::api::QueryParameter;
use crate::error::WarehouseError;
use gdelt_model::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Events,
    Mentions,
    Gkg,
    WebNgrams,
    QuoteGraph,
    EntityGraph,
    GeoGraph,
}

impl Table {
    /// Fully-qualified partitioned table name. The unpartitioned shadow
    /// tables would scan terabytes and are deliberately unreachable from
    /// here.
    pub fn qualified_name(&self) -> &'static str {
        match self {
            Table::Events => "gdelt-bq.gdeltv2.events_partitioned",
            Table::Mentions => "gdelt-bq.gdeltv2.eventmentions_partitioned",
            Table::Gkg => "gdelt-bq.gdeltv2.gkg_partitioned",
            Table::WebNgrams => "gdelt-bq.gdeltv2.webngrams_partitioned",
            Table::QuoteGraph => "gdelt-bq.gdeltv2.gqg_partitioned",
            Table::EntityGraph => "gdelt-bq.gdeltv2.geg_partitioned",
            Table::GeoGraph => "gdelt-bq.gdeltv2.ggg_partitioned",
        }
    }

    /// Columns that may appear in a projection or predicate for this table.
    pub fn allowed_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Events => EVENTS_COLUMNS,
            Table::Mentions => MENTIONS_COLUMNS,
            Table::Gkg => GKG_COLUMNS,
            Table::WebNgrams => WEB_NGRAMS_COLUMNS,
            Table::QuoteGraph => &["date", "url", "lang", "quote", "context", "offset", "length"],
            Table::EntityGraph => &["date", "url", "lang", "entities"],
            Table::GeoGraph => &["date", "url", "lang", "locations"],
        }
    }
}

const EVENTS_COLUMNS: &[&str] = &[
    "GLOBALEVENTID",
    "SQLDATE",
    "MonthYear",
    "Year",
    "FractionDate",
    "Actor1Code",
    "Actor1Name",
    "Actor1CountryCode",
    "Actor1KnownGroupCode",
    "Actor1EthnicCode",
    "Actor1Religion1Code",
    "Actor1Religion2Code",
    "Actor1Type1Code",
    "Actor1Type2Code",
    "Actor1Type3Code",
    "Actor2Code",
    "Actor2Name",
    "Actor2CountryCode",
    "Actor2KnownGroupCode",
    "Actor2EthnicCode",
    "Actor2Religion1Code",
    "Actor2Religion2Code",
    "Actor2Type1Code",
    "Actor2Type2Code",
    "Actor2Type3Code",
    "IsRootEvent",
    "EventCode",
    "EventBaseCode",
    "EventRootCode",
    "QuadClass",
    "GoldsteinScale",
    "NumMentions",
    "NumSources",
    "NumArticles",
    "AvgTone",
    "Actor1Geo_Type",
    "Actor1Geo_FullName",
    "Actor1Geo_CountryCode",
    "Actor1Geo_ADM1Code",
    "Actor1Geo_ADM2Code",
    "Actor1Geo_Lat",
    "Actor1Geo_Long",
    "Actor1Geo_FeatureID",
    "Actor2Geo_Type",
    "Actor2Geo_FullName",
    "Actor2Geo_CountryCode",
    "Actor2Geo_ADM1Code",
    "Actor2Geo_ADM2Code",
    "Actor2Geo_Lat",
    "Actor2Geo_Long",
    "Actor2Geo_FeatureID",
    "ActionGeo_Type",
    "ActionGeo_FullName",
    "ActionGeo_CountryCode",
    "ActionGeo_ADM1Code",
    "ActionGeo_ADM2Code",
    "ActionGeo_Lat",
    "ActionGeo_Long",
    "ActionGeo_FeatureID",
    "DATEADDED",
    "SOURCEURL",
];

const MENTIONS_COLUMNS: &[&str] = &[
    "GLOBALEVENTID",
    "EventTimeDate",
    "MentionTimeDate",
    "MentionType",
    "MentionSourceName",
    "MentionIdentifier",
    "SentenceID",
    "Actor1CharOffset",
    "Actor2CharOffset",
    "ActionCharOffset",
    "InRawText",
    "Confidence",
    "MentionDocLen",
    "MentionDocTone",
    "MentionDocTranslationInfo",
    "Extras",
];

const GKG_COLUMNS: &[&str] = &[
    "GKGRECORDID",
    "DATE",
    "SourceCollectionIdentifier",
    "SourceCommonName",
    "DocumentIdentifier",
    "V1Counts",
    "V21Counts",
    "V1Themes",
    "V2Themes",
    "V1Locations",
    "V2Locations",
    "V1Persons",
    "V2Persons",
    "V1Organizations",
    "V2Organizations",
    "V15Tone",
    "V21Dates",
    "GCAM",
    "V21SharingImage",
    "V21RelatedImages",
    "V21SocialImageEmbeds",
    "V21SocialVideoEmbeds",
    "V21Quotations",
    "V21AllNames",
    "V21Amounts",
    "V21TranslationInfo",
    "V2ExtrasXML",
];

const WEB_NGRAMS_COLUMNS: &[&str] = &["date", "ngram", "lang", "type", "pos", "pre", "post", "url"];

/// A predicate of the form `column IN UNNEST(@param)`.
#[derive(Debug, Clone)]
enum Selector {
    Strings { column: &'static str, values: Vec<String> },
    Ints { column: &'static str, values: Vec<i64> },
}

/// Builds one parameterized query against a partitioned table.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: Table,
    columns: Vec<&'static str>,
    range: DateRange,
    selectors: Vec<Selector>,
    limit: Option<u64>,
}

impl QueryBuilder {
    pub fn new(table: Table, range: DateRange) -> QueryBuilder {
        QueryBuilder {
            table,
            columns: Vec::new(),
            range,
            selectors: Vec::new(),
            limit: None,
        }
    }

    /// Projects `columns`; an empty projection selects the full allow-list.
    pub fn columns(mut self, columns: &[&'static str]) -> QueryBuilder {
        self.columns = columns.to_vec();
        self
    }

    pub fn string_selector(mut self, column: &'static str, values: &[String]) -> QueryBuilder {
        if !values.is_empty() {
            self.selectors.push(Selector::Strings {
                column,
                values: values.to_vec(),
            });
        }
        self
    }

    pub fn int_selector(mut self, column: &'static str, values: &[i64]) -> QueryBuilder {
        if !values.is_empty() {
            self.selectors.push(Selector::Ints {
                column,
                values: values.to_vec(),
            });
        }
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> QueryBuilder {
        self.limit = limit;
        self
    }

    fn check_column(&self, column: &str) -> Result<(), WarehouseError> {
        if self.table.allowed_columns().contains(&column) {
            Ok(())
        } else {
            Err(WarehouseError::ColumnNotAllowed {
                table: self.table.qualified_name(),
                column: column.to_string(),
            })
        }
    }

    /// Produces the SQL text and its named parameters. Column names come
    /// exclusively from the allow-list; everything else is a parameter.
    pub fn build(self) -> Result<(String, Vec<QueryParameter>), WarehouseError> {
        let projection: Vec<&'static str> = if self.columns.is_empty() {
            self.table.allowed_columns().to_vec()
        } else {
            self.columns.clone()
        };
        for column in &projection {
            self.check_column(column)?;
        }

        let mut sql = format!(
            "SELECT {} FROM `{}` WHERE _PARTITIONTIME >= @part_start AND _PARTITIONTIME < @part_end",
            projection.join(", "),
            self.table.qualified_name(),
        );
        let mut parameters = vec![
            QueryParameter::timestamp("part_start", self.range.start),
            QueryParameter::timestamp("part_end", self.range.end),
        ];

        for (idx, selector) in self.selectors.iter().enumerate() {
            let name = format!("sel{idx}");
            match selector {
                Selector::Strings { column, values } => {
                    self.check_column(column)?;
                    sql.push_str(&format!(" AND {column} IN UNNEST(@{name})"));
                    parameters.push(QueryParameter::string_array(&name, values));
                }
                Selector::Ints { column, values } => {
                    self.check_column(column)?;
                    sql.push_str(&format!(" AND {column} IN UNNEST(@{name})"));
                    parameters.push(QueryParameter::int_array(&name, values));
                }
            }
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok((sql, parameters))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn range() -> DateRange {
        let start = chrono::Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        DateRange::new(start, start + chrono::Duration::days(1))
    }

    #[test]
    fn partition_predicate_is_always_present() {
        let (sql, params) = QueryBuilder::new(Table::Events, range()).build().unwrap();
        assert!(sql.contains("FROM `gdelt-bq.gdeltv2.events_partitioned`"));
        assert!(sql.contains("_PARTITIONTIME >= @part_start"));
        assert!(sql.contains("_PARTITIONTIME < @part_end"));
        assert_eq!(params[0].name, "part_start");
        assert_eq!(params[1].name, "part_end");
    }

    #[test]
    fn selectors_become_parameters_not_text() {
        let (sql, params) = QueryBuilder::new(Table::Events, range())
            .columns(&["GLOBALEVENTID", "EventCode"])
            .string_selector("EventCode", &["0251'; DROP TABLE x;--".to_string()])
            .build()
            .unwrap();
        // The hostile value appears only inside a parameter, never in SQL.
        assert!(!sql.contains("DROP TABLE"));
        assert!(sql.contains("EventCode IN UNNEST(@sel0)"));
        assert_eq!(
            params[2].parameter_value.array_values[0].value.as_deref(),
            Some("0251'; DROP TABLE x;--")
        );
    }

    #[test]
    fn unknown_columns_are_rejected_before_submission() {
        let err = QueryBuilder::new(Table::Events, range())
            .columns(&["GLOBALEVENTID; DROP"])
            .build()
            .unwrap_err();
        assert!(matches!(err, WarehouseError::ColumnNotAllowed { .. }));

        let err = QueryBuilder::new(Table::Mentions, range())
            .string_selector("NotAColumn", &["x".to_string()])
            .build()
            .unwrap_err();
        assert!(matches!(err, WarehouseError::ColumnNotAllowed { .. }));
    }

    #[test]
    fn limit_is_appended_verbatim_from_a_numeric() {
        let (sql, _) = QueryBuilder::new(Table::Gkg, range())
            .limit(Some(250))
            .build()
            .unwrap();
        assert!(sql.ends_with("LIMIT 250"));
    }
}
