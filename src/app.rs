//! HTTP surface of the dashboard.
//!
//! Pages are server-rendered with handlebars and every request recomputes its
//! filtered view from the cached table. The table itself is fetched at most once
//! per TTL window through [`AppState::current`].

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::{DateTime, Local};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;

use crate::analysis::report::{self, CrossReport, Report, VARIABLE_MAX_RANGE};
use crate::cache::TtlCache;
use crate::columns::{self, ColumnCatalog};
use crate::config::Settings;
use crate::downloader;
use crate::error::{DashboardError, NoData};
use crate::filters::{self, Filters};
use crate::graph::{self, ChartOptions};
use crate::saving;
use crate::source::Source;
use crate::table::Table;

const DEFAULT_VARIABLE_MAX: usize = 15;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct AppState {
    settings: Settings,
    catalog: ColumnCatalog,
    templates: Handlebars<'static>,
    data: Mutex<DataState>,
}

struct DataState {
    cache: TtlCache<Arc<Table>>,
    source: Option<Source>,
    loaded_at: Option<DateTime<Local>>,
}

/// The cached table plus what the footer says about it.
struct Current {
    table: Arc<Table>,
    loaded_at: Option<DateTime<Local>>,
    source: Option<String>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, handlebars::TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_partial("head", include_str!("./templates/head.hbs"))?;
        templates.register_partial("foot", include_str!("./templates/foot.hbs"))?;
        templates.register_partial("filters", include_str!("./templates/filters.hbs"))?;
        templates.register_template_string("landing", include_str!("./templates/landing.hbs"))?;
        templates.register_template_string("report", include_str!("./templates/report.hbs"))?;
        templates.register_template_string("variables", include_str!("./templates/variables.hbs"))?;
        templates.register_template_string("cruce", include_str!("./templates/cruce.hbs"))?;
        templates.register_template_string("message", include_str!("./templates/message.hbs"))?;

        let cache = TtlCache::new(settings.cache_ttl);
        Ok(AppState {
            settings,
            catalog: ColumnCatalog::builtin(),
            templates,
            data: Mutex::new(DataState {
                cache,
                source: None,
                loaded_at: None,
            }),
        })
    }

    /// Returns the cached table, loading it when the cache is empty or stale.
    ///
    /// The lock is held across the fetch so concurrent requests wait for one load
    /// instead of starting their own. A failed load leaves the cache empty.
    async fn current(&self) -> Result<Current, DashboardError> {
        let mut data = self.data.lock().await;
        if let Some(table) = data.cache.get(Instant::now()) {
            return Ok(Current {
                table: Arc::clone(table),
                loaded_at: data.loaded_at,
                source: data.source.as_ref().map(|s| s.to_string()),
            });
        }

        let source = match data.source.take() {
            Some(source) => source,
            None => Source::from_settings(&self.settings).inspect_err(|e| {
                log::error!("cannot build data source: {}", e);
            })?,
        };
        log::info!("loading survey data from {}", source);
        let result = source.load(&self.catalog).await;
        let label = source.to_string();
        data.source = Some(source);

        match result {
            Ok(table) => {
                let table = Arc::new(table);
                let now = Local::now();
                data.cache.store(Arc::clone(&table), Instant::now());
                data.loaded_at = Some(now);
                log::info!("cached {} records for {:?}", table.len(), data.cache.ttl());
                Ok(Current {
                    table,
                    loaded_at: Some(now),
                    source: Some(label),
                })
            }
            Err(e) => {
                log::error!("failed to load survey data from {}: {}", label, e);
                Err(e)
            }
        }
    }

    async fn invalidate(&self) {
        let mut data = self.data.lock().await;
        data.cache.invalidate();
        log::info!("survey data cache invalidated");
    }

    fn base(&self, href: &str, page_title: &str, current: Option<&Current>) -> Map<String, JsonValue> {
        let mut context = Map::new();
        context.insert("app_title".into(), json!(self.settings.title));
        context.insert("page_title".into(), json!(page_title));
        context.insert("nav".into(), JsonValue::Array(nav(href)));
        if let Some(current) = current {
            context.insert(
                "loaded_at".into(),
                json!(current.loaded_at.map(|t| t.format(TIMESTAMP_FORMAT).to_string())),
            );
            context.insert("source".into(), json!(current.source));
        }
        context
    }

    fn render(&self, status: StatusCode, template: &str, context: &Map<String, JsonValue>) -> Response {
        match self.templates.render(template, context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                log::error!("failed to render {}: {}", template, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error al generar la página").into_response()
            }
        }
    }

    fn failure_page(&self, href: &str, failure: Failure) -> Response {
        let mut context = self.base(href, "Error", None);
        context.insert("message".into(), json!(failure.to_string()));
        if let Failure::Load(_) = failure {
            context.insert(
                "hint".into(),
                json!("Revise GOOGLE_SHEET_ID, WORKSHEET_NAME y CREDENTIALS_PATH, o configure DATA_CSV para usar un archivo local."),
            );
        }
        self.render(failure.status(), "message", &context)
    }
}

/// Why a request could not produce its view.
#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error("No existe el reporte '{0}'")]
    UnknownReport(String),

    #[error("{0}")]
    Selection(String),

    #[error("Error cargando datos: {0}")]
    Load(#[from] DashboardError),

    #[error("{0}")]
    NoData(#[from] NoData),

    #[error("Error generando el archivo: {0}")]
    Export(String),
}

impl Failure {
    fn status(&self) -> StatusCode {
        match self {
            Failure::UnknownReport(_) => StatusCode::NOT_FOUND,
            Failure::Selection(_) => StatusCode::BAD_REQUEST,
            Failure::Load(_) => StatusCode::SERVICE_UNAVAILABLE,
            Failure::NoData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Failure::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Serialize)]
struct ApiError {
    status: String,
    message: String,
}

fn api_error(failure: Failure) -> Response {
    (
        failure.status(),
        Json(ApiError {
            status: "error".to_string(),
            message: failure.to_string(),
        }),
    )
        .into_response()
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ViewQuery {
    top_n: Option<usize>,
    percent: Option<String>,
    raw: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct VariableQuery {
    var: Option<String>,
    max: Option<usize>,
    percent: Option<String>,
    raw: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CrossQuery {
    var1: Option<String>,
    var2: Option<String>,
}

/// Checkbox values: anything but absent, empty, "false" or "0" turns the option on.
fn flag(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && v != "false" && v != "0")
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_landing))
        .route("/reports/:key", get(report_page))
        .route("/reports/:key/chart.svg", get(report_chart))
        .route("/reports/:key/export.csv", get(report_csv))
        .route("/reports/:key/export.xlsx", get(report_xlsx))
        .route("/variables", get(variables_page))
        .route("/cruce", get(cross_page))
        .route("/cruce/chart.svg", get(cross_chart))
        .route("/cruce/export.csv", get(cross_csv))
        .route("/api/reports/:key", get(api_report))
        .route("/api/cruce", get(api_cross))
        .route("/api/overview", get(api_overview))
        .route("/api/snapshot", get(export_snapshot))
        .route("/refresh", post(refresh))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    for issue in settings.issues() {
        log::warn!("{}", issue);
    }
    let bind_addr = settings.bind_addr.clone();
    let state = Arc::new(AppState::new(settings)?);
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn nav(active: &str) -> Vec<JsonValue> {
    let mut items = vec![json!({ "title": "Inicio", "href": "/", "active": active == "/" })];
    for spec in report::builtin_reports() {
        let href = format!("/reports/{}", spec.key);
        items.push(json!({ "title": spec.title, "active": active == href, "href": href }));
    }
    for (title, href) in [("Explorador de variables", "/variables"), ("Cruce de variables", "/cruce")] {
        items.push(json!({ "title": title, "href": href, "active": active == href }));
    }
    items
}

fn filter_context(context: &mut Map<String, JsonValue>, current: &Current, filtered: &Table, filters: &Filters, catalog: &ColumnCatalog) {
    let options: Vec<JsonValue> = filters::options(&current.table, catalog, filters)
        .into_iter()
        .map(|opt| {
            let values: Vec<JsonValue> = opt
                .values
                .iter()
                .map(|v| json!({ "value": v, "selected": opt.selected.as_deref() == Some(v.as_str()) }))
                .collect();
            json!({
                "key": opt.key,
                "label": opt.label,
                "all_option": opt.all_option,
                "options": values,
            })
        })
        .collect();
    context.insert("filters".into(), JsonValue::Array(options));
    context.insert("filtered_count".into(), json!(filtered.len()));
    context.insert("total_count".into(), json!(current.table.len()));
}

fn table_context(table: &Table) -> JsonValue {
    let rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(|v| v.to_label()).collect())
        .collect();
    json!({ "columns": table.columns(), "rows": rows })
}

fn pct(value: f64) -> String {
    format!("{:.1}", value)
}

fn report_context(context: &mut Map<String, JsonValue>, report: &Report) {
    let rows: Vec<JsonValue> = report
        .rows
        .iter()
        .map(|row| {
            json!({
                "label": row.label,
                "count": row.count,
                "pct": pct(row.percentage),
                "tier": row.tier_label,
                "class": row.tier.map(|t| t.css_class()),
            })
        })
        .collect();
    let tiers: Vec<JsonValue> = report
        .tiers
        .iter()
        .map(|t| json!({ "label": t.label, "categories": t.categories, "class": t.tier.css_class() }))
        .collect();

    if let Some(top) = report.top() {
        context.insert("top_label".into(), json!(top.label));
        context.insert("top_pct".into(), json!(pct(top.percentage)));
    }
    context.insert("mentions_per_record".into(), json!(format!("{:.2}", report.mentions_per_record())));
    context.insert("top3".into(), json!(pct(report.top3_share)));
    context.insert("top5".into(), json!(pct(report.top5_share)));
    context.insert("rows".into(), JsonValue::Array(rows));
    if !tiers.is_empty() {
        context.insert("tiers".into(), JsonValue::Array(tiers));
    }
    context.insert("report".into(), json!(report));
}

fn chart_or_empty(result: Result<String, graph::PlotError>) -> String {
    result.unwrap_or_else(|e| {
        log::error!("chart rendering failed: {}", e);
        String::new()
    })
}

async fn serve_landing(State(state): State<Arc<AppState>>) -> Response {
    let loaded = state.current().await;
    let mut context = state.base("/", "Inicio", loaded.as_ref().ok());
    context.insert("issues".into(), json!(state.settings.issues()));

    let pages: Vec<JsonValue> = nav("/").into_iter().skip(1).collect();
    context.insert("pages".into(), JsonValue::Array(pages));

    match loaded {
        Ok(current) => {
            let overview = crate::analysis::overview::overview(&current.table, &state.catalog);
            let geography: Vec<JsonValue> = overview
                .geography
                .iter()
                .map(|zone| {
                    json!({
                        "label": zone.label,
                        "zones": zone.counts.len(),
                        "leader": zone.leader.as_ref().map(|(l, _)| l),
                        "leader_count": zone.leader.as_ref().map(|(_, c)| c),
                    })
                })
                .collect();
            let columns: Vec<JsonValue> = overview
                .summary
                .columns
                .iter()
                .map(|c| {
                    json!({
                        "name": c.name,
                        "missing": c.missing,
                        "completeness": pct(c.completeness),
                        "unique": c.unique,
                    })
                })
                .collect();
            if let Some(timeline) = &overview.timeline {
                context.insert(
                    "timeline".into(),
                    json!({
                        "first_year": timeline.first_year,
                        "last_year": timeline.last_year,
                        "busiest_year": timeline.busiest_year,
                        "busiest_count": timeline.busiest_count,
                        "trend": timeline.trend.as_str(),
                    }),
                );
            }
            context.insert("total_count".into(), json!(current.table.len()));
            context.insert("column_count".into(), json!(current.table.columns().len()));
            context.insert("geography".into(), JsonValue::Array(geography));
            context.insert("columns".into(), JsonValue::Array(columns));
            context.insert("overview".into(), json!(overview));
        }
        Err(e) => {
            context.insert("error".into(), json!(e.to_string()));
        }
    }

    state.render(StatusCode::OK, "landing", &context)
}

async fn report_page(
    Path(key): Path<String>,
    Query(filters): Query<Filters>,
    Query(view): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let href = format!("/reports/{}", key);
    let Some(spec) = report::find_report(&key) else {
        return state.failure_page(&href, Failure::UnknownReport(key));
    };
    let current = match state.current().await {
        Ok(current) => current,
        Err(e) => return state.failure_page(&href, e.into()),
    };
    let filtered = filters.apply(&current.table, &state.catalog);
    let percent = flag(view.percent.as_deref());
    let raw = flag(view.raw.as_deref());
    let top_n = view.top_n.map(report::clamp_top_n).unwrap_or(spec.top_n);

    let mut context = state.base(&href, spec.title, Some(&current));
    filter_context(&mut context, &current, &filtered, &filters, &state.catalog);
    context.insert("action".into(), json!(href));
    context.insert("top_n".into(), json!(top_n));
    context.insert("top_n_min".into(), json!(report::TOP_N_RANGE.start()));
    context.insert("top_n_max".into(), json!(report::TOP_N_RANGE.end()));
    context.insert("percent".into(), json!(percent));
    context.insert("raw".into(), json!(raw));

    match report::run_report(&filtered, &state.catalog, &spec, Some(top_n)) {
        Ok(report) => {
            let options = ChartOptions {
                title: report.title.clone(),
                show_percentages: percent,
                ..ChartOptions::default()
            };
            let query = format!("top_n={}{}", top_n, filters.query_suffix());
            context.insert("chart_svg".into(), json!(chart_or_empty(graph::report_chart_svg(&report, &options))));
            context.insert("csv_href".into(), json!(format!("{}/export.csv?{}", href, query)));
            context.insert("xlsx_href".into(), json!(format!("{}/export.xlsx?{}", href, query)));
            report_context(&mut context, &report);
        }
        Err(no_data) => {
            log::debug!("report {} has no data: {}", key, no_data);
            context.insert("message".into(), json!(no_data.to_string()));
        }
    }
    if raw {
        context.insert("raw_table".into(), table_context(&filtered));
    }

    state.render(StatusCode::OK, "report", &context)
}

async fn compute_report(state: &AppState, key: &str, filters: &Filters, top_n: Option<usize>) -> Result<Report, Failure> {
    let spec = report::find_report(key).ok_or_else(|| Failure::UnknownReport(key.to_string()))?;
    let current = state.current().await?;
    let filtered = filters.apply(&current.table, &state.catalog);
    Ok(report::run_report(&filtered, &state.catalog, &spec, top_n)?)
}

fn svg(body: String) -> Response {
    ([(header::CONTENT_TYPE, "image/svg+xml")], body).into_response()
}

fn attachment<B: IntoResponse>(content_type: &str, filename: &str, body: B) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        body,
    )
        .into_response()
}

async fn report_chart(
    Path(key): Path<String>,
    Query(filters): Query<Filters>,
    Query(view): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, Failure> {
    let report = compute_report(&state, &key, &filters, view.top_n).await?;
    let options = ChartOptions {
        title: report.title.clone(),
        show_percentages: flag(view.percent.as_deref()),
        ..ChartOptions::default()
    };
    let body = graph::report_chart_svg(&report, &options).map_err(|e| Failure::Export(e.to_string()))?;
    Ok(svg(body))
}

async fn report_csv(
    Path(key): Path<String>,
    Query(filters): Query<Filters>,
    Query(view): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, Failure> {
    let report = compute_report(&state, &key, &filters, view.top_n).await?;
    let body = downloader::to_csv(&downloader::report_table(&report));
    let filename = downloader::export_filename(&report.key, &Local::now(), "csv");
    log::info!("exporting {} as {}", report.key, filename);
    Ok(attachment("text/csv; charset=utf-8", &filename, body))
}

async fn report_xlsx(
    Path(key): Path<String>,
    Query(filters): Query<Filters>,
    Query(view): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, Failure> {
    let report = compute_report(&state, &key, &filters, view.top_n).await?;
    let body = downloader::to_xlsx(&downloader::report_table(&report), &report.key)
        .map_err(|e| Failure::Export(e.to_string()))?;
    let filename = downloader::export_filename(&report.key, &Local::now(), "xlsx");
    log::info!("exporting {} as {}", report.key, filename);
    Ok(attachment(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &filename,
        body,
    ))
}

/// Activity columns present in `table`, in catalog order.
fn activity_columns(catalog: &ColumnCatalog, table: &Table) -> Vec<&'static str> {
    columns::ACTIVITY_COLUMNS
        .into_iter()
        .filter(|key| catalog.resolve(table, key).is_some())
        .collect()
}

fn variable_options(catalog: &ColumnCatalog, available: &[&'static str], selected: &str) -> Vec<JsonValue> {
    available
        .iter()
        .map(|key| json!({ "key": key, "label": catalog.label(key), "selected": *key == selected }))
        .collect()
}

async fn variables_page(
    Query(filters): Query<Filters>,
    Query(query): Query<VariableQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let href = "/variables";
    let current = match state.current().await {
        Ok(current) => current,
        Err(e) => return state.failure_page(href, e.into()),
    };
    let filtered = filters.apply(&current.table, &state.catalog);
    let percent = flag(query.percent.as_deref());
    let raw = flag(query.raw.as_deref());
    let max = query
        .max
        .unwrap_or(DEFAULT_VARIABLE_MAX)
        .clamp(*VARIABLE_MAX_RANGE.start(), *VARIABLE_MAX_RANGE.end());

    let mut context = state.base(href, "Explorador de variables", Some(&current));
    filter_context(&mut context, &current, &filtered, &filters, &state.catalog);
    context.insert("max".into(), json!(max));
    context.insert("max_min".into(), json!(VARIABLE_MAX_RANGE.start()));
    context.insert("max_max".into(), json!(VARIABLE_MAX_RANGE.end()));
    context.insert("percent".into(), json!(percent));
    context.insert("raw".into(), json!(raw));

    let available = activity_columns(&state.catalog, &current.table);
    let selected = query
        .var
        .as_deref()
        .and_then(|v| available.iter().copied().find(|k| *k == v))
        .or_else(|| available.first().copied());
    let Some(selected) = selected else {
        context.insert("message".into(), json!("No se encontraron columnas de actividades en los datos"));
        return state.render(StatusCode::OK, "variables", &context);
    };
    context.insert(
        "variables".into(),
        JsonValue::Array(variable_options(&state.catalog, &available, selected)),
    );

    let result = report::variable_report(selected, &state.catalog, max)
        .ok_or(NoData::ColumnNotFound {
            column: state.catalog.label(selected).to_string(),
        })
        .and_then(|spec| report::run_report(&filtered, &state.catalog, &spec, None));
    match result {
        Ok(report) => {
            let options = ChartOptions {
                title: report.title.clone(),
                show_percentages: percent,
                ..ChartOptions::default()
            };
            context.insert("chart_svg".into(), json!(chart_or_empty(graph::bar_chart_svg(&report.chart, &options))));
            report_context(&mut context, &report);
        }
        Err(no_data) => {
            context.insert("message".into(), json!(no_data.to_string()));
        }
    }

    state.render(StatusCode::OK, "variables", &context)
}

/// Resolves the requested pair of variables, defaulting to the first two
/// available activity columns.
fn cross_selection(available: &[&'static str], query: &CrossQuery) -> Result<(&'static str, &'static str), Failure> {
    if available.len() < 2 {
        return Err(Failure::Selection(
            "Se necesitan al menos dos variables de actividades para el cruce".to_string(),
        ));
    }
    let find = |requested: Option<&str>| requested.and_then(|r| available.iter().copied().find(|k| *k == r));

    let var1 = find(query.var1.as_deref()).unwrap_or(available[0]);
    let var2 = match find(query.var2.as_deref()) {
        Some(var2) => var2,
        None => available.iter().copied().find(|k| *k != var1).unwrap_or(available[1]),
    };
    if var1 == var2 {
        return Err(Failure::Selection(
            "Selecciona variables diferentes para el cruce".to_string(),
        ));
    }
    Ok((var1, var2))
}

async fn compute_cross(state: &AppState, filters: &Filters, query: &CrossQuery) -> Result<CrossReport, Failure> {
    let current = state.current().await?;
    let available = activity_columns(&state.catalog, &current.table);
    let (var1, var2) = cross_selection(&available, query)?;
    let filtered = filters.apply(&current.table, &state.catalog);
    Ok(report::run_cross(&filtered, &state.catalog, var1, var2)?)
}

fn waffle_svg(cross: &CrossReport) -> Result<String, graph::PlotError> {
    let slices = graph::waffle_slices(&cross.tab, graph::WAFFLE_COMBINATIONS);
    let options = ChartOptions {
        title: format!("{} × {}", cross.label1, cross.label2),
        ..ChartOptions::default()
    };
    graph::waffle_chart_svg(&slices, &options)
}

async fn cross_page(
    Query(filters): Query<Filters>,
    Query(query): Query<CrossQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let href = "/cruce";
    let current = match state.current().await {
        Ok(current) => current,
        Err(e) => return state.failure_page(href, e.into()),
    };
    let filtered = filters.apply(&current.table, &state.catalog);
    let available = activity_columns(&state.catalog, &current.table);

    let mut context = state.base(href, "Cruce de variables", Some(&current));
    filter_context(&mut context, &current, &filtered, &filters, &state.catalog);

    let (var1, var2) = match cross_selection(&available, &query) {
        Ok(pair) => pair,
        Err(failure) => {
            let var1 = query.var1.as_deref().unwrap_or_default();
            let var2 = query.var2.as_deref().unwrap_or_default();
            context.insert("var1_options".into(), JsonValue::Array(variable_options(&state.catalog, &available, var1)));
            context.insert("var2_options".into(), JsonValue::Array(variable_options(&state.catalog, &available, var2)));
            context.insert("message".into(), json!(failure.to_string()));
            return state.render(StatusCode::OK, "cruce", &context);
        }
    };
    context.insert("var1_options".into(), JsonValue::Array(variable_options(&state.catalog, &available, var1)));
    context.insert("var2_options".into(), JsonValue::Array(variable_options(&state.catalog, &available, var2)));

    match report::run_cross(&filtered, &state.catalog, var1, var2) {
        Ok(cross) => {
            context.insert("chart_svg".into(), json!(chart_or_empty(waffle_svg(&cross))));
            context.insert("combinations".into(), json!(graph::WAFFLE_COMBINATIONS));
            context.insert("table".into(), table_context(&downloader::crosstab_table(&cross)));
            context.insert(
                "csv_href".into(),
                json!(format!("/cruce/export.csv?var1={}&var2={}{}", var1, var2, filters.query_suffix())),
            );
            if let Some(insights) = &cross.insights {
                context.insert("insights_share".into(), json!(pct(insights.share)));
                context.insert("insights".into(), json!(insights));
            }
        }
        Err(no_data) => {
            context.insert("message".into(), json!(no_data.to_string()));
        }
    }

    state.render(StatusCode::OK, "cruce", &context)
}

async fn cross_chart(
    Query(filters): Query<Filters>,
    Query(query): Query<CrossQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, Failure> {
    let cross = compute_cross(&state, &filters, &query).await?;
    let body = waffle_svg(&cross).map_err(|e| Failure::Export(e.to_string()))?;
    Ok(svg(body))
}

async fn cross_csv(
    Query(filters): Query<Filters>,
    Query(query): Query<CrossQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, Failure> {
    let cross = compute_cross(&state, &filters, &query).await?;
    let body = downloader::to_csv(&downloader::crosstab_table(&cross));
    let key = format!("cruce_{}_{}", cross.var1, cross.var2);
    let filename = downloader::export_filename(&key, &Local::now(), "csv");
    Ok(attachment("text/csv; charset=utf-8", &filename, body))
}

async fn api_report(
    Path(key): Path<String>,
    Query(filters): Query<Filters>,
    Query(view): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match compute_report(&state, &key, &filters, view.top_n).await {
        Ok(report) => Json(report).into_response(),
        Err(failure) => api_error(failure),
    }
}

async fn api_cross(
    Query(filters): Query<Filters>,
    Query(query): Query<CrossQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match compute_cross(&state, &filters, &query).await {
        Ok(cross) => Json(cross).into_response(),
        Err(failure) => api_error(failure),
    }
}

async fn api_overview(Query(filters): Query<Filters>, State(state): State<Arc<AppState>>) -> Response {
    match state.current().await {
        Ok(current) => {
            let filtered = filters.apply(&current.table, &state.catalog);
            Json(crate::analysis::overview::overview(&filtered, &state.catalog)).into_response()
        }
        Err(e) => api_error(e.into()),
    }
}

/// Downloads the cached table as a gzip snapshot loadable through `DATA_SNAPSHOT`.
async fn export_snapshot(State(state): State<Arc<AppState>>) -> Response {
    let current = match state.current().await {
        Ok(current) => current,
        Err(e) => return api_error(e.into()),
    };
    match saving::serialize_to_memory(&current.table) {
        Ok(buffer) => {
            let filename = downloader::export_filename("comedores", &Local::now(), "bin.gz");
            attachment("application/gzip", &filename, buffer)
        }
        Err(e) => {
            log::error!("snapshot export failed: {}", e);
            api_error(Failure::Export(e.to_string()))
        }
    }
}

async fn refresh(State(state): State<Arc<AppState>>) -> Redirect {
    state.invalidate().await;
    Redirect::to("/")
}
