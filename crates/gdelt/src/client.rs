//! The top-level client handle.

use crate::config::{ConfigOverlay, GdeltConfig};
use crate::dispatch::{self, DispatchOptions, InitialSource, WarehousePlan};
use crate::error::Error;
use crate::stream::RecordStream;
use gdelt_bigquery::{
    resolve_credentials_path, BigQueryClient, BigQueryOptions, Credentials, QueryBuilder, Table,
    WarehouseError,
};
use gdelt_files::slots::IndexEntry;
use gdelt_files::{FileSource, FileSourceOptions, SlotStream};
use gdelt_model::records::{
    BroadcastNgram, Event, FrontpageLink, Gkg, GraphRecord, Mention, TvGkg, Vgkg, WebNgram,
};
use gdelt_model::{
    EventsFilter, GkgFilter, GraphFilter, MentionsFilter, NGramsFilter, RawRecord, RecordError,
    RecordType, SourcePreference, TvGkgFilter, VgkgFilter,
};

/// Client for the GDELT dataset: slot files, warehouse, and REST endpoints
/// behind one handle.
///
/// Construction resolves the layered configuration (constructor values,
/// `GDELT_*` environment, `~/.gdelt/config.toml`, defaults). The warehouse
/// is available only when a project id and credentials are configured; file
/// streaming always works.
pub struct GdeltClient {
    config: GdeltConfig,
    files: FileSource,
    warehouse: Option<BigQueryClient>,
}

impl GdeltClient {
    pub async fn new() -> Result<GdeltClient, Error> {
        Self::with_config(ConfigOverlay::default()).await
    }

    pub async fn with_config(overlay: ConfigOverlay) -> Result<GdeltClient, Error> {
        let config = overlay.resolve()?;
        Self::from_resolved(config).await
    }

    pub(crate) async fn from_resolved(config: GdeltConfig) -> Result<GdeltClient, Error> {
        let files = FileSource::new(FileSourceOptions {
            timeout: config.request_timeout,
            max_retries: config.max_retries,
            window: config.max_concurrent_downloads,
            extra_allowed_hosts: config.extra_allowed_hosts.clone(),
            cache_dir: config.cache_dir.clone(),
            cache_ttl: config.cache_ttl,
        })
        .await?;

        let warehouse = match (&config.warehouse_project, Self::credentials(&config)?) {
            (Some(project), Some(credentials)) => Some(BigQueryClient::new(BigQueryOptions {
                project_id: project.clone(),
                credentials,
                base_url: std::env::var("GDELT_BQ_ENDPOINT").ok(),
                query_timeout: config.query_timeout,
                location: None,
            })?),
            _ => None,
        };

        Ok(GdeltClient {
            config,
            files,
            warehouse,
        })
    }

    fn credentials(config: &GdeltConfig) -> Result<Option<Credentials>, Error> {
        if let Some(token) = &config.credentials_token {
            return Ok(Some(Credentials::Token(token.clone())));
        }
        match &config.credentials_path {
            Some(path) => {
                let resolved = resolve_credentials_path(&config.credentials_parent, path)?;
                tracing::debug!(path = %resolved.display(), "using service-account credentials");
                Ok(Some(Credentials::ServiceAccount(resolved)))
            }
            None => Ok(None),
        }
    }

    fn warehouse_plan(&self, builder: QueryBuilder) -> Option<WarehousePlan> {
        self.warehouse.clone().map(|client| WarehousePlan {
            client,
            builder,
        })
    }

    /// Resolves the initial source for a request per the selection rules:
    /// a forced source is honored; otherwise files first with warehouse
    /// fallback when configured and enabled.
    fn select_source(
        &self,
        source: SourcePreference,
        stream: SlotStream,
        plan: Option<WarehousePlan>,
    ) -> Result<InitialSource, Error> {
        match source {
            SourcePreference::Files => Ok(InitialSource::Files {
                stream,
                fallback: None,
            }),
            SourcePreference::Warehouse => match plan {
                Some(plan) => Ok(InitialSource::Warehouse(plan)),
                None => Err(Error::Warehouse(WarehouseError::MissingCredentials)),
            },
            SourcePreference::Auto => Ok(InitialSource::Files {
                stream,
                fallback: plan.filter(|_| self.config.fallback_enabled),
            }),
        }
    }

    /// Streams validated events for `filter`.
    pub fn events(&self, filter: EventsFilter) -> Result<RecordStream<Event>, Error> {
        filter.validate()?;

        let builder = QueryBuilder::new(Table::Events, filter.range)
            .string_selector("ActionGeo_CountryCode", &filter.countries)
            .string_selector("EventCode", &filter.cameo_codes)
            .limit(filter.limit);
        let plan = self.warehouse_plan(builder);
        let stream = self
            .files
            .stream(RecordType::Events, &filter.range, filter.translated);
        let initial = self.select_source(filter.source, stream, plan)?;

        let countries = filter.countries.clone();
        let cameo = filter.cameo_codes.clone();
        let post_filter = (!countries.is_empty() || !cameo.is_empty()).then(|| {
            Box::new(move |event: &Event| {
                let country_ok = countries.is_empty()
                    || [&event.actor1_geo, &event.actor2_geo, &event.action_geo]
                        .iter()
                        .filter_map(|geo| geo.as_ref())
                        .filter_map(|geo| geo.country_code.as_deref())
                        .any(|code| countries.iter().any(|c| c == code));
                let cameo_ok = cameo.is_empty()
                    || event
                        .event_code
                        .as_deref()
                        .map_or(false, |code| cameo.iter().any(|c| c == code));
                country_ok && cameo_ok
            }) as Box<dyn Fn(&Event) -> bool + Send>
        });

        Ok(dispatch::run(
            initial,
            DispatchOptions {
                record_type: RecordType::Events,
                error_policy: filter.error_policy,
                dedup: Some(filter.dedup),
                limit: filter.limit,
                from_raw: Box::new(Event::from_raw),
                post_filter,
            },
        ))
    }

    /// Streams mentions. Mentions are event-id keyed, so when the source is
    /// `Auto` and a warehouse is configured the warehouse is preferred; the
    /// file scheme would require scanning every slot in range.
    pub fn mentions(&self, filter: MentionsFilter) -> Result<RecordStream<Mention>, Error> {
        filter.validate()?;

        let builder = QueryBuilder::new(Table::Mentions, filter.range)
            .int_selector("GLOBALEVENTID", &filter.event_ids)
            .limit(filter.limit);
        let plan = self.warehouse_plan(builder);

        let source = match filter.source {
            SourcePreference::Auto if plan.is_some() => SourcePreference::Warehouse,
            other => other,
        };
        let stream = self.files.stream(RecordType::Mentions, &filter.range, false);
        let initial = self.select_source(source, stream, plan)?;

        let event_ids = filter.event_ids.clone();
        let post_filter = (!event_ids.is_empty()).then(|| {
            Box::new(move |mention: &Mention| event_ids.contains(&mention.global_event_id))
                as Box<dyn Fn(&Mention) -> bool + Send>
        });

        Ok(dispatch::run(
            initial,
            DispatchOptions {
                record_type: RecordType::Mentions,
                error_policy: filter.error_policy,
                dedup: None,
                limit: filter.limit,
                from_raw: Box::new(Mention::from_raw),
                post_filter,
            },
        ))
    }

    /// Streams GKG records.
    pub fn gkg(&self, filter: GkgFilter) -> Result<RecordStream<Gkg>, Error> {
        filter.validate()?;

        let builder = QueryBuilder::new(Table::Gkg, filter.range).limit(filter.limit);
        let plan = self.warehouse_plan(builder);
        let stream = self
            .files
            .stream(RecordType::Gkg, &filter.range, filter.translated);
        let initial = self.select_source(filter.source, stream, plan)?;

        let themes = filter.themes.clone();
        let countries = filter.countries.clone();
        let languages = filter.languages.clone();
        let post_filter = (!themes.is_empty() || !countries.is_empty() || !languages.is_empty())
            .then(|| {
                Box::new(move |gkg: &Gkg| {
                    let theme_ok = themes.is_empty()
                        || gkg.themes.iter().any(|t| themes.contains(t))
                        || gkg
                            .enhanced_themes
                            .iter()
                            .any(|t| themes.contains(&t.theme));
                    let country_ok = countries.is_empty()
                        || gkg
                            .locations
                            .iter()
                            .chain(gkg.enhanced_locations.iter().map(|l| &l.location))
                            .filter_map(|l| l.country_code.as_deref())
                            .any(|code| countries.iter().any(|c| c == code));
                    let lang_ok = languages.is_empty()
                        || gkg
                            .translation_info
                            .as_ref()
                            .and_then(|info| info.source_language.as_deref())
                            .map_or(false, |lang| languages.iter().any(|l| l == lang));
                    theme_ok && country_ok && lang_ok
                }) as Box<dyn Fn(&Gkg) -> bool + Send>
            });

        Ok(dispatch::run(
            initial,
            DispatchOptions {
                record_type: RecordType::Gkg,
                error_policy: filter.error_policy,
                dedup: Some(filter.dedup),
                limit: filter.limit,
                from_raw: Box::new(Gkg::from_raw),
                post_filter,
            },
        ))
    }

    /// Streams Visual GKG records. Files only: the warehouse does not host
    /// this dataset.
    pub fn vgkg(&self, filter: VgkgFilter) -> Result<RecordStream<Vgkg>, Error> {
        filter.validate()?;
        let stream = self.files.stream(RecordType::Vgkg, &filter.range, false);
        Ok(dispatch::run(
            InitialSource::Files {
                stream,
                fallback: None,
            },
            DispatchOptions {
                record_type: RecordType::Vgkg,
                error_policy: filter.error_policy,
                dedup: None,
                limit: filter.limit,
                from_raw: Box::new(Vgkg::from_raw),
                post_filter: None,
            },
        ))
    }

    /// Streams TV GKG records (daily files, 48 h embargo).
    pub fn tv_gkg(&self, filter: TvGkgFilter) -> Result<RecordStream<TvGkg>, Error> {
        filter.validate()?;
        let stream = self.files.stream(RecordType::TvGkg, &filter.range, false);

        let stations = filter.stations.clone();
        let shows = filter.shows.clone();
        let post_filter = (!stations.is_empty() || !shows.is_empty()).then(|| {
            Box::new(move |record: &TvGkg| {
                // TV GKG record ids look like `20240115000000-CNN_...`; the
                // station is the leading token of the suffix.
                let suffix = record
                    .gkg
                    .record_id
                    .split_once('-')
                    .map(|(_, s)| s)
                    .unwrap_or("");
                let station_ok =
                    stations.is_empty() || stations.iter().any(|s| suffix.starts_with(s.as_str()));
                let show_ok = shows.is_empty()
                    || record
                        .gkg
                        .source_common_name
                        .as_deref()
                        .map_or(false, |name| shows.iter().any(|s| name.contains(s.as_str())));
                station_ok && show_ok
            }) as Box<dyn Fn(&TvGkg) -> bool + Send>
        });

        Ok(dispatch::run(
            InitialSource::Files {
                stream,
                fallback: None,
            },
            DispatchOptions {
                record_type: RecordType::TvGkg,
                error_policy: filter.error_policy,
                dedup: None,
                limit: filter.limit,
                from_raw: Box::new(TvGkg::from_raw),
                post_filter,
            },
        ))
    }

    /// Streams web n-grams.
    pub fn web_ngrams(&self, filter: NGramsFilter) -> Result<RecordStream<WebNgram>, Error> {
        filter.validate()?;

        let builder = QueryBuilder::new(Table::WebNgrams, filter.range)
            .string_selector("lang", &filter.languages)
            .string_selector("ngram", &filter.ngrams)
            .limit(filter.limit);
        let plan = self.warehouse_plan(builder);
        let stream = self.files.stream(RecordType::WebNgrams, &filter.range, false);
        let initial = self.select_source(filter.source, stream, plan)?;

        let languages = filter.languages.clone();
        let ngrams = filter.ngrams.clone();
        let post_filter = (!languages.is_empty() || !ngrams.is_empty()).then(|| {
            Box::new(move |record: &WebNgram| {
                let lang_ok = languages.is_empty()
                    || record
                        .lang
                        .as_deref()
                        .map_or(false, |lang| languages.iter().any(|l| l == lang));
                let ngram_ok = ngrams.is_empty() || ngrams.iter().any(|n| n == &record.ngram);
                lang_ok && ngram_ok
            }) as Box<dyn Fn(&WebNgram) -> bool + Send>
        });

        Ok(dispatch::run(
            initial,
            DispatchOptions {
                record_type: RecordType::WebNgrams,
                error_policy: filter.error_policy,
                dedup: None,
                limit: filter.limit,
                from_raw: Box::new(WebNgram::from_raw),
                post_filter,
            },
        ))
    }

    /// Streams broadcast n-grams from an explicit inventory of file URLs
    /// (these datasets have no computable URL scheme).
    pub fn broadcast_ngrams(
        &self,
        filter: NGramsFilter,
        inventory: Vec<String>,
    ) -> Result<RecordStream<BroadcastNgram>, Error> {
        filter.validate()?;
        let stream = self.files.stream_urls(inventory);

        let stations = filter.stations.clone();
        let post_filter = (!stations.is_empty()).then(|| {
            Box::new(move |record: &BroadcastNgram| {
                record
                    .station
                    .as_deref()
                    .map_or(false, |station| stations.iter().any(|s| s == station))
            }) as Box<dyn Fn(&BroadcastNgram) -> bool + Send>
        });

        Ok(dispatch::run(
            InitialSource::Files {
                stream,
                fallback: None,
            },
            DispatchOptions {
                record_type: RecordType::BroadcastNgrams,
                error_policy: filter.error_policy,
                dedup: None,
                limit: filter.limit,
                from_raw: Box::new(BroadcastNgram::from_raw),
                post_filter,
            },
        ))
    }

    /// Streams one of the five JSON-lines graph datasets.
    pub fn graph(&self, filter: GraphFilter) -> Result<RecordStream<GraphRecord>, Error> {
        filter.validate()?;
        let record_type = filter.record_type;
        if record_type == RecordType::FrontpageGraph {
            return Err(Error::Config {
                detail: "use frontpage_graph() for the TAB-separated frontpage dataset".to_string(),
            });
        }

        let table = match record_type {
            RecordType::QuoteGraph => Some(Table::QuoteGraph),
            RecordType::EntityGraph => Some(Table::EntityGraph),
            RecordType::GeoGraph => Some(Table::GeoGraph),
            _ => None,
        };
        let plan = table.and_then(|table| {
            self.warehouse_plan(QueryBuilder::new(table, filter.range).limit(filter.limit))
        });
        let stream = self.files.stream(record_type, &filter.range, false);
        let fallback = plan.filter(|_| self.config.fallback_enabled);

        Ok(dispatch::run(
            InitialSource::Files { stream, fallback },
            DispatchOptions {
                record_type,
                error_policy: filter.error_policy,
                dedup: None,
                limit: filter.limit,
                from_raw: Box::new(move |raw: &RawRecord| -> Result<GraphRecord, RecordError> {
                    GraphRecord::from_raw(record_type, raw)
                }),
                post_filter: None,
            },
        ))
    }

    /// Streams the hourly Global Frontpage Graph.
    pub fn frontpage_graph(
        &self,
        filter: GraphFilter,
    ) -> Result<RecordStream<FrontpageLink>, Error> {
        filter.validate()?;
        if filter.record_type != RecordType::FrontpageGraph {
            return Err(Error::Config {
                detail: "frontpage_graph() requires the frontpage record type".to_string(),
            });
        }
        let stream = self
            .files
            .stream(RecordType::FrontpageGraph, &filter.range, false);
        Ok(dispatch::run(
            InitialSource::Files {
                stream,
                fallback: None,
            },
            DispatchOptions {
                record_type: RecordType::FrontpageGraph,
                error_policy: filter.error_policy,
                dedup: None,
                limit: filter.limit,
                from_raw: Box::new(FrontpageLink::from_raw),
                post_filter: None,
            },
        ))
    }

    /// The master file index (maintenance enumeration).
    pub async fn master_index(&self, translated: bool) -> Result<Vec<IndexEntry>, Error> {
        Ok(self.files.master_index(translated).await?)
    }

    /// Descriptors of the most recently published slots.
    pub async fn latest_slots(&self, translated: bool) -> Result<Vec<IndexEntry>, Error> {
        Ok(self.files.latest_slots(translated).await?)
    }

    pub(crate) fn files(&self) -> &FileSource {
        &self.files
    }

    pub fn config(&self) -> &GdeltConfig {
        &self.config
    }
}
