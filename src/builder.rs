//! The build driver.
//!
//! A [`Builder`] owns everything one site build needs: the context table,
//! the program registry, the signal channels, module storage, the URL
//! registry and the template environment. Modules are set up once in
//! [`Builder::new`]; each call to [`Builder::run`] is a fresh build run.
//!
//! Per source file the order is fixed:
//!
//! ```text
//! discover → create context → prepare ─┐
//!                                      ▼
//!         before_file_processed → run (if stale) → after_file_published
//!
//! ... and once all files went through: before_build_finished
//! ```

use crate::{
    config::{Config, Layer, SiteConfig},
    context::{Context, ContextId, ContextTable},
    incremental::needs_build,
    log,
    modules::{self, Module},
    program::{self, DEFAULT_PROGRAM, Program, ProgramKind},
    render::{highlight::Highlighter, rst::Directives, template},
    routing::{PatternSource, RouteValues, UrlRegistry},
    signals::{self, AFTER_FILE_PUBLISHED, BEFORE_BUILD_FINISHED, BEFORE_FILE_PROCESSED, SignalBus},
    storage::{ModuleStorage, Node},
    utils::{
        log::status_line,
        minify::{MinifyType, minify},
    },
};
use anyhow::{Context as _, Result, anyhow};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use globset::{Glob, GlobSet, GlobSetBuilder};
use minijinja::{Environment, Value as TemplateValue};
use serde::Serialize;
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    rc::Rc,
    sync::Arc,
};
use walkdir::WalkDir;

/// Supplies extra template variables; receives the page being rendered,
/// if any.
pub type ContextProcessor = Rc<dyn Fn(&mut Builder, Option<ContextId>) -> Result<Layer>>;

// ============================================================================
// Template views
// ============================================================================

/// The page being rendered, as templates see it (`ctx`).
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub source: String,
    pub slug: String,
    pub title: Option<String>,
    /// RFC 3339.
    pub pub_date: Option<String>,
    pub summary: Option<String>,
}

/// A published entry listed on another page.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub title: Option<String>,
    pub slug: String,
    pub link: String,
    pub pub_date: Option<String>,
    pub summary: Option<String>,
    pub contents: String,
}

fn rfc3339(date: Option<&DateTime<FixedOffset>>) -> Option<String> {
    date.map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, false))
}

// ============================================================================
// Output files
// ============================================================================

/// A file being written under the output folder. Dropping it flushes and
/// closes the file; [`OutputFile::finish`] does the same but reports errors.
pub struct OutputFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OutputFile {
    fn create(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Relative output path for a link: url-decoded, `.`/`..` dropped, and a
/// trailing slash served by `index.html`.
pub fn link_path(link: &str) -> PathBuf {
    let decoded = urlencoding::decode(link).map_or_else(|_| link.to_owned(), |s| s.into_owned());
    let mut path = PathBuf::new();
    for segment in decoded.split('/') {
        if !matches!(segment, "" | "." | "..") {
            path.push(segment);
        }
    }
    if decoded.is_empty() || decoded.ends_with('/') {
        path.push("index.html");
    }
    path
}

// ============================================================================
// Builder
// ============================================================================

pub struct Builder {
    site: SiteConfig,
    /// Global configuration; `root_get` lookups go here.
    config: Config,
    /// Defaults modules contribute, between global config and front-matter.
    defaults: Layer,
    timezone: FixedOffset,
    urls: UrlRegistry,
    file_signals: SignalBus<Builder, ContextId>,
    build_signals: SignalBus<Builder, ()>,
    storage: ModuleStorage,
    contexts: ContextTable,
    programs: HashMap<String, ProgramKind>,
    directives: Directives,
    highlighter: Option<Rc<Highlighter>>,
    processors: Vec<ContextProcessor>,
    templates: Environment<'static>,
    ignore: GlobSet,
    modules: Vec<String>,
    force: bool,
}

impl Builder {
    /// Create a builder and set up every module named in `build.modules`.
    pub fn new(site: SiteConfig) -> Result<Self> {
        let timezone = site.timezone()?;
        let config = Config::new(site.global_layer());
        let ignore = ignore_set(&site.build.ignore)?;
        let module_names = site.build.modules.clone();

        let mut builder = Self {
            site,
            config,
            defaults: Layer::new(),
            timezone,
            urls: UrlRegistry::new(),
            file_signals: SignalBus::new(),
            build_signals: SignalBus::new(),
            storage: ModuleStorage::default(),
            contexts: ContextTable::default(),
            programs: program::builtin(),
            directives: Directives::default(),
            highlighter: None,
            processors: Vec::new(),
            templates: Environment::new(),
            ignore,
            modules: Vec::new(),
            force: false,
        };

        for name in &module_names {
            let module =
                modules::builtin(name).ok_or_else(|| anyhow!("unknown module `{name}` in [build.modules]"))?;
            builder.setup_module(module.as_ref())?;
        }
        builder.refresh_templates();
        Ok(builder)
    }

    /// Set up an additional module after construction.
    pub fn add_module(&mut self, module: &dyn Module) -> Result<()> {
        self.setup_module(module)?;
        self.refresh_templates();
        Ok(())
    }

    fn setup_module(&mut self, module: &dyn Module) -> Result<()> {
        module
            .setup(self)
            .with_context(|| format!("failed to set up module `{}`", module.name()))?;
        self.modules.push(module.name().to_owned());
        Ok(())
    }

    /// Templates see a snapshot of the URL registry, so this runs whenever
    /// setup may have registered new endpoints.
    fn refresh_templates(&mut self) {
        self.templates = template::environment(
            &self.site.build.templates,
            Arc::new(self.urls.clone()),
            &self.config.merged(),
            &self.site.base.locale,
        );
    }

    /// Rebuild everything on the next run, stale or not.
    pub fn set_force(&mut self, force: bool) {
        self.force = force;
    }

    // ------------------------------------------------------------------------
    // Services for modules and programs
    // ------------------------------------------------------------------------

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn urls(&self) -> &UrlRegistry {
        &self.urls
    }

    /// Register an endpoint variant; config-key sources are resolved now.
    pub fn register_url(
        &mut self,
        endpoint: &str,
        source: impl Into<PatternSource>,
        defaults: RouteValues,
    ) -> Result<()> {
        self.urls.register(endpoint, source, defaults, &self.config)?;
        Ok(())
    }

    pub fn link_to(&self, endpoint: &str, values: &RouteValues) -> Result<String> {
        Ok(self.urls.build_link(endpoint, values)?)
    }

    pub fn register_program(&mut self, name: &str, kind: ProgramKind) {
        self.programs.insert(name.to_owned(), kind);
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn directives_mut(&mut self) -> &mut Directives {
        &mut self.directives
    }

    pub fn highlighter(&self) -> Option<Rc<Highlighter>> {
        self.highlighter.clone()
    }

    pub fn set_highlighter(&mut self, highlighter: Rc<Highlighter>) {
        self.highlighter = Some(highlighter);
    }

    /// Merge `layer` into the defaults every context starts from.
    pub fn add_defaults(&mut self, layer: Layer) {
        self.defaults.extend(layer);
    }

    pub fn add_context_processor(
        &mut self,
        processor: impl Fn(&mut Builder, Option<ContextId>) -> Result<Layer> + 'static,
    ) {
        self.processors.push(Rc::new(processor));
    }

    /// Subscribe to a per-file signal.
    pub fn connect(
        &mut self,
        signal: &str,
        handler: impl Fn(&mut Builder, &ContextId) -> Result<()> + 'static,
    ) {
        self.file_signals.connect(signal, handler);
    }

    /// Subscribe to `before_build_finished`.
    pub fn connect_build_finished(&mut self, handler: impl Fn(&mut Builder, &()) -> Result<()> + 'static) {
        self.build_signals.connect(BEFORE_BUILD_FINISHED, handler);
    }

    /// The storage namespace of a module, created on first use.
    pub fn get_storage(&mut self, namespace: &str) -> &mut Node {
        self.storage.namespace(namespace)
    }

    pub fn storage(&self, namespace: &str) -> Option<&Node> {
        self.storage.get(namespace)
    }

    pub fn context(&self, id: ContextId) -> Result<&Context> {
        Ok(self.contexts.get(id)?)
    }

    pub fn context_mut(&mut self, id: ContextId) -> Result<&mut Context> {
        Ok(self.contexts.get_mut(id)?)
    }

    pub fn full_source(&self, id: ContextId) -> Result<PathBuf> {
        Ok(self.site.build.source.join(self.context(id)?.source()))
    }

    pub fn full_destination(&self, id: ContextId) -> Result<PathBuf> {
        Ok(self.site.build.output.join(self.context(id)?.destination()))
    }

    pub fn read_source(&self, id: ContextId) -> Result<String> {
        let path = self.full_source(id)?;
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    /// Write a rendered page to the context's destination.
    pub fn write_destination(&self, id: ContextId, html: &str) -> Result<()> {
        let mut file = OutputFile::create(self.full_destination(id)?)?;
        writeln!(file, "{}", minify(MinifyType::Html(html), &self.site))?;
        file.finish()
    }

    /// Open the output file an endpoint link resolves to.
    pub fn open_link_file(&self, endpoint: &str, values: &RouteValues) -> Result<OutputFile> {
        let link = self.link_to(endpoint, values)?;
        OutputFile::create(self.site.build.output.join(link_path(&link)))
    }

    /// Open `name` inside the static folder of the output.
    pub fn open_static_file(&self, name: &str) -> Result<OutputFile> {
        let folder = self.site.build.output.join(&self.site.build.static_folder);
        OutputFile::create(folder.join(link_path(name)))
    }

    /// Render `template` and write it to the file behind an endpoint link.
    pub fn write_page(&mut self, endpoint: &str, values: &RouteValues, template: &str, extra: Layer) -> Result<()> {
        let html = self.render_template(template, extra, None)?;
        let mut file = self.open_link_file(endpoint, values)?;
        writeln!(file, "{}", minify(MinifyType::Html(&html), &self.site))?;
        file.finish()
    }

    pub fn write_feed(&self, endpoint: &str, values: &RouteValues, xml: &str) -> Result<()> {
        let mut file = self.open_link_file(endpoint, values)?;
        write!(file, "{}", minify(MinifyType::Feed(xml), &self.site))?;
        file.finish()
    }

    /// Render a template with the module-supplied variables, `stylesheets`,
    /// `ctx` (when `page` is given) and `extra` on top.
    pub fn render_template(&mut self, name: &str, extra: Layer, page: Option<ContextId>) -> Result<String> {
        let mut vars = Layer::new();
        for processor in self.processors.clone() {
            vars.extend(processor(self, page)?);
        }
        vars.insert("stylesheets".into(), serde_json::to_value(self.stylesheet_links(page)?)?);
        if let Some(id) = page {
            vars.insert("ctx".into(), serde_json::to_value(self.page_view(id)?)?);
        }
        vars.extend(extra);

        let template = self.templates.get_template(name)?;
        Ok(template.render(TemplateValue::from_serialize(&vars))?)
    }

    /// The rendered body of a context; programs cache it.
    pub fn render_contents(&mut self, id: ContextId) -> Result<String> {
        self.with_program(id, |program, builder| program.render_contents(builder))
    }

    pub fn page_view(&self, id: ContextId) -> Result<PageView> {
        let context = self.context(id)?;
        Ok(PageView {
            source: display_path(context.source()),
            slug: context.slug(),
            title: context.title.clone(),
            pub_date: rfc3339(context.pub_date.as_ref()),
            summary: context.summary.clone(),
        })
    }

    pub fn entry_view(&mut self, id: ContextId) -> Result<EntryView> {
        let contents = self.render_contents(id)?;
        let context = self.context(id)?;
        let slug = context.slug();
        Ok(EntryView {
            title: context.title.clone(),
            link: slug.clone(),
            slug,
            pub_date: rfc3339(context.pub_date.as_ref()),
            summary: context.summary.clone(),
            contents,
        })
    }

    /// Stylesheet links of a page, or of every context for module pages.
    fn stylesheet_links(&self, page: Option<ContextId>) -> Result<Vec<String>> {
        let ids = match page {
            Some(id) => vec![id],
            None => self.contexts.ids(),
        };
        let folder = display_path(&self.site.build.static_folder);
        let mut links: Vec<String> = Vec::new();
        for id in ids {
            for name in &self.context(id)?.stylesheets {
                let link = format!("/{}/{name}", folder.trim_matches('/'));
                if !links.contains(&link) {
                    links.push(link);
                }
            }
        }
        Ok(links)
    }

    // ------------------------------------------------------------------------
    // Build run
    // ------------------------------------------------------------------------

    /// Source files relative to the source folder, sorted lexically.
    pub fn discover_sources(&self) -> Result<Vec<PathBuf>> {
        let root = &self.site.build.source;
        let mut sources = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry));

        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if entry.file_type().is_file() {
                sources.push(entry.path().strip_prefix(root)?.to_path_buf());
            }
        }

        sources.sort();
        Ok(sources)
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        let path = entry.path();
        let build = &self.site.build;
        let config_path = &self.site.config_path;

        name.starts_with('.')
            || name.starts_with('_')
            || path == build.output
            || path == build.templates
            || path == config_path.as_path()
            || (entry.depth() == 1 && config_path.file_name() == Some(entry.file_name()))
            || self.ignore.is_match(entry.file_name())
    }

    /// Program kind for a source path.
    fn program_for(&self, source: &Path) -> Result<ProgramKind> {
        let name = source
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.site.build.programs.get(ext))
            .map_or(DEFAULT_PROGRAM, String::as_str);
        self.programs
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown program `{name}` for {}", source.display()))
    }

    /// Whether any source is newer than its output, without creating
    /// contexts or programs.
    ///
    /// Sources seen by the last run are checked against the destination they
    /// resolved to; new sources against their program's default one.
    pub fn anything_needs_build(&self) -> Result<bool> {
        for source in self.discover_sources()? {
            let destination = match self.contexts.destination_of(&source) {
                Some(resolved) => resolved.to_path_buf(),
                None => self.program_for(&source)?.desired_filename(&source),
            };
            let destination = self.site.build.output.join(destination);
            if needs_build(&self.site.build.source.join(&source), &destination, self.force) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn create_context(&mut self, source: PathBuf) -> Result<ContextId> {
        let kind = self.program_for(&source)?;
        let destination = kind.desired_filename(&source);
        let config = self.config.with_layer(self.defaults.clone());

        let id = self.contexts.insert(Context::new(source, destination, config));
        self.context_mut(id)?.program = Some(kind.create(id));
        Ok(id)
    }

    /// Run `f` with the context's program taken out of the table, so the
    /// program can borrow the builder.
    fn with_program<T>(
        &mut self,
        id: ContextId,
        f: impl FnOnce(&mut Box<dyn Program>, &mut Builder) -> Result<T>,
    ) -> Result<T> {
        let mut program = self.context_mut(id)?.program.take().ok_or_else(|| {
            anyhow!(
                "program of `{}` is already running",
                self.contexts.get(id).map(|c| display_path(c.source())).unwrap_or_default()
            )
        })?;
        let result = f(&mut program, self);
        self.context_mut(id)?.program = Some(program);
        result
    }

    fn send(&mut self, signal: &str, id: ContextId) -> Result<()> {
        let handlers = self.file_signals.receivers(signal);
        signals::dispatch(&handlers, self, &id)
    }

    /// One full build run. Aborts on the first error.
    pub fn run(&mut self) -> Result<()> {
        self.storage.clear();
        self.contexts.clear();

        let mut ids = Vec::new();
        for source in self.discover_sources()? {
            ids.push(self.create_context(source)?);
        }

        for &id in &ids {
            self.with_program(id, |program, builder| program.prepare(builder))?;
        }

        for &id in &ids {
            self.process(id)?;
        }

        let handlers = self.build_signals.receivers(BEFORE_BUILD_FINISHED);
        signals::dispatch(&handlers, self, &())?;

        self.force = false;
        Ok(())
    }

    fn process(&mut self, id: ContextId) -> Result<()> {
        self.send(BEFORE_FILE_PROCESSED, id)?;

        let source = self.full_source(id)?;
        let destination = self.full_destination(id)?;
        if needs_build(&source, &destination, self.force) {
            let existed = destination.exists();
            self.with_program(id, |program, builder| program.run(builder))?;
            let name = display_path(self.context(id)?.source());
            log!("build"; "{}", status_line(existed, &name));
        }

        self.context_mut(id)?.mark_published();
        self.send(AFTER_FILE_PUBLISHED, id)
    }
}

fn ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut set = GlobSetBuilder::new();
    for pattern in patterns {
        set.add(Glob::new(pattern).with_context(|| format!("invalid ignore pattern `{pattern}`"))?);
    }
    Ok(set.build()?)
}

/// A relative path with `/` separators.
fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
