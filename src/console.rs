//! Interactive expense console
//!
//! Reads one command per line from stdin while the controller's timers and
//! fetches keep running; every applied page is printed as a table.

use anyhow::Context;
use chrono::{DateTime, Utc};
use expensedesk_config::Config;
use expensedesk_core::{
    fetch_summary, AccountClient, CollectionClient, CollectionController, ControllerOptions,
    CoreError, Credentials, DeleteConfirmation, Editor, Expense, ExpenseRequest, Operator, Session,
    TableUpdate, EXPENSE_COLUMNS, SUMMARY_DAYS,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render;

const HELP: &str = "\
Commands:
  filter <column> [op] [value]  edit a filter term (ops: == != > < >= <= ilike like)
  clear                         reset all filters
  sort <column>                 cycle ascending, descending, unsorted
  page <n> | next | prev        move between pages
  size <n>                      rows per page
  show                          print the current page again
  add | edit <id>               open the expense form
  set <field> <value>           fill a form field (title category amount date description)
  save | cancel                 submit or discard the form / pending delete
  delete <id> | confirm         delete an expense after confirmation
  refresh | retry               fetch the current page again
  url | go <location>           show or load a location
  summary [days]                spending totals, last 30 days by default
  whoami | logout | help | quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Filter {
        column: String,
        operator: Option<Operator>,
        value: String,
    },
    Clear,
    Sort(String),
    Page(u32),
    Next,
    Prev,
    Size(u32),
    Show,
    Add,
    Edit(i64),
    Set { field: String, value: String },
    Save,
    Cancel,
    Delete(i64),
    Confirm,
    Refresh,
    Url,
    Go(String),
    Summary(i64),
    WhoAmI,
    Logout,
    Help,
    Quit,
}

fn number<T: std::str::FromStr>(arg: Option<&str>, what: &str) -> Result<T, String> {
    let raw = arg.ok_or_else(|| format!("missing {}", what))?;
    raw.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid {}", raw, what))
}

/// Parse one input line; `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let arg = if rest.is_empty() { None } else { Some(rest) };

    let command = match verb.to_lowercase().as_str() {
        "filter" | "f" => {
            let (column, tail) = match rest.split_once(char::is_whitespace) {
                Some((column, tail)) => (column, tail.trim()),
                None => (rest, ""),
            };
            if column.is_empty() {
                return Err("usage: filter <column> [op] [value]".to_string());
            }
            let (operator, value) = match tail.split_once(char::is_whitespace) {
                Some((op, value)) => match op.parse::<Operator>() {
                    Ok(operator) => (Some(operator), value.trim()),
                    Err(_) => (None, tail),
                },
                None => match tail.parse::<Operator>() {
                    Ok(operator) => (Some(operator), ""),
                    Err(_) => (None, tail),
                },
            };
            Command::Filter {
                column: column.to_string(),
                operator,
                value: value.to_string(),
            }
        }
        "clear" => Command::Clear,
        "sort" | "s" => Command::Sort(arg.ok_or("usage: sort <column>")?.to_string()),
        "page" | "p" => {
            let page: u32 = number(arg, "page number")?;
            if page == 0 {
                return Err("pages are numbered from 1".to_string());
            }
            Command::Page(page - 1)
        }
        "next" | "n" => Command::Next,
        "prev" => Command::Prev,
        "size" => Command::Size(number(arg, "page size")?),
        "show" | "ls" => Command::Show,
        "add" | "new" => Command::Add,
        "edit" => Command::Edit(number(arg, "expense id")?),
        "set" => {
            let (field, value) = rest
                .split_once(char::is_whitespace)
                .map(|(field, value)| (field, value.trim()))
                .unwrap_or((rest, ""));
            if field.is_empty() {
                return Err("usage: set <field> <value>".to_string());
            }
            Command::Set {
                field: field.to_string(),
                value: value.to_string(),
            }
        }
        "save" => Command::Save,
        "cancel" => Command::Cancel,
        "delete" | "rm" => Command::Delete(number(arg, "expense id")?),
        "confirm" | "yes" => Command::Confirm,
        "refresh" | "retry" => Command::Refresh,
        "url" => Command::Url,
        "go" => Command::Go(rest.to_string()),
        "summary" | "dash" => {
            let days: i64 = match arg {
                Some(_) => number(arg, "number of days")?,
                None => SUMMARY_DAYS,
            };
            if days <= 0 {
                return Err("the summary needs at least one day".to_string());
            }
            Command::Summary(days)
        }
        "whoami" => Command::WhoAmI,
        "logout" => Command::Logout,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

/// Console state around one mounted controller
pub struct Console<C>
where
    C: CollectionClient<Record = Expense, Draft = ExpenseRequest> + AccountClient + 'static,
{
    client: Arc<C>,
    controller: CollectionController<C>,
    session: Session,
    editor: Editor,
    confirmation: DeleteConfirmation,
    config: Config,
    signed_out: bool,
}

/// Sign in with the configured credentials, or reuse the configured cookie
pub async fn start_session<A>(account: &A, config: &Config) -> anyhow::Result<Session>
where
    A: AccountClient + ?Sized,
{
    match (&config.api.username, &config.api.password) {
        (Some(username), Some(password)) => {
            let credentials = Credentials {
                username: username.clone(),
                password: password.clone(),
            };
            Session::login(account, &credentials)
                .await
                .with_context(|| format!("Failed to sign in as {}", username))
        }
        _ => Session::open(account)
            .await
            .context("Failed to open a session with the backend"),
    }
}

impl<C> Console<C>
where
    C: CollectionClient<Record = Expense, Draft = ExpenseRequest> + AccountClient + 'static,
{
    /// Open a session and mount the table at `location`
    pub async fn open(client: Arc<C>, config: Config, location: &str) -> anyhow::Result<Self> {
        let session = start_session(client.as_ref(), &config).await?;
        let controller = CollectionController::mount(
            Arc::clone(&client),
            EXPENSE_COLUMNS,
            ControllerOptions::from_config(&config),
            location,
        )?;
        Ok(Self {
            client,
            controller,
            session,
            editor: Editor::new(),
            confirmation: DeleteConfirmation::default(),
            config,
            signed_out: false,
        })
    }

    pub fn controller(&self) -> &CollectionController<C> {
        &self.controller
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current page as text
    pub fn table(&self) -> String {
        render::render_table(
            self.controller.columns(),
            self.controller.sort(),
            self.controller.page_result(),
            &self.config.currency,
        )
    }

    /// Text for an applied event, if it is worth printing
    pub fn describe(&mut self, update: &TableUpdate) -> Option<String> {
        match update {
            TableUpdate::Loaded { .. } => Some(self.table()),
            TableUpdate::FetchFailed(e) => {
                self.session.observe::<()>(&Err(e.clone()));
                Some(format!("Could not load expenses: {}", e.to_details()))
            }
            TableUpdate::FilterCommitted { filter } => Some(match filter {
                Some(expression) => format!("Filtering by {}", expression),
                None => "Filters cleared".to_string(),
            }),
            TableUpdate::FilterUnchanged | TableUpdate::Discarded { .. } => None,
        }
    }

    /// Run one command; returns the text to print and whether to stop
    pub async fn execute(&mut self, command: Command) -> (String, bool) {
        match self.run(command).await {
            Ok(flow) => flow,
            Err(e) => {
                self.session.observe::<()>(&Err(e.clone()));
                (format!("Error: {}", e.to_details()), false)
            }
        }
    }

    async fn run(&mut self, command: Command) -> Result<(String, bool), CoreError> {
        let text = match command {
            Command::Filter {
                column,
                operator,
                value,
            } => {
                self.controller
                    .edit_filter(&column, operator, Some(&value))?;
                render::render_filters(self.controller.filters())
            }
            Command::Clear => {
                self.controller.clear_filters();
                "Clearing filters".to_string()
            }
            Command::Sort(column) => {
                self.controller.toggle_sort(&column)?;
                match self.controller.sort().active() {
                    Some(spec) => format!("Sorting by {} {}", spec.column, spec.direction),
                    None => "Unsorted".to_string(),
                }
            }
            Command::Page(page) => self.go_to_page(page),
            Command::Next => {
                let current = self.controller.pagination().page();
                let last = self.controller.page_result().total_pages.saturating_sub(1);
                if current >= last {
                    "Already on the last page".to_string()
                } else {
                    self.go_to_page(current + 1)
                }
            }
            Command::Prev => match self.controller.pagination().page().checked_sub(1) {
                Some(page) => self.go_to_page(page),
                None => "Already on the first page".to_string(),
            },
            Command::Size(size) => {
                if !self.config.pagination.page_size_options.contains(&size) {
                    log::debug!("Page size {} is not among the configured options", size);
                }
                if self.controller.set_page_size(size)? {
                    format!("Showing {} per page", size)
                } else {
                    format!("Already showing {} per page", size)
                }
            }
            Command::Show => self.table(),
            Command::Add => {
                self.editor.open_create();
                self.form_text()
            }
            Command::Edit(id) => {
                let expense = match self.controller.rows().iter().find(|e| e.id == id) {
                    Some(expense) => expense.clone(),
                    None => {
                        let fetched = CollectionClient::get(self.client.as_ref(), id).await;
                        self.session.observe(&fetched);
                        fetched?
                    }
                };
                self.editor.open_edit(&expense);
                self.form_text()
            }
            Command::Set { field, value } => {
                if !self.editor.is_open() {
                    return Ok(("No form is open, use 'add' or 'edit <id>'".to_string(), false));
                }
                self.editor.set_field(&field, &value)?;
                self.form_text()
            }
            Command::Save => {
                let saved = self.editor.save(&mut self.controller).await;
                self.session.observe(&saved);
                let saved = saved?;
                format!("Saved expense #{} {}", saved.id, saved.title)
            }
            Command::Cancel => {
                if self.editor.is_open() {
                    self.editor.close();
                    "Form discarded".to_string()
                } else if self.confirmation.pending().is_some() {
                    self.confirmation.cancel();
                    "Delete cancelled".to_string()
                } else {
                    "Nothing to cancel".to_string()
                }
            }
            Command::Delete(id) => {
                self.confirmation.request(id);
                format!("Delete expense #{}? Type 'confirm' or 'cancel'", id)
            }
            Command::Confirm => {
                let deleted = self.confirmation.confirm(&mut self.controller).await;
                self.session.observe(&deleted);
                format!("Deleted expense #{}", deleted?)
            }
            Command::Refresh => {
                self.controller.refresh();
                "Refreshing".to_string()
            }
            Command::Url => self.controller.location(),
            Command::Go(location) => {
                self.controller.navigate(&location)?;
                format!("Loading {}", self.controller.location())
            }
            Command::Summary(days) => self.summary(Utc::now(), days).await?,
            Command::WhoAmI => {
                let user = self.session.user()?;
                format!("{} <{}>", user.username, user.email)
            }
            Command::Logout => {
                let result = self.session.logout(self.client.as_ref()).await;
                self.signed_out = true;
                match result {
                    Ok(()) => "Logged out".to_string(),
                    Err(e) => format!("Signed out locally; the backend said: {}", e.to_details()),
                }
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok((String::new(), true)),
        };
        let quit = !self.session.is_open();
        Ok((text, quit))
    }

    fn go_to_page(&mut self, page: u32) -> String {
        let shown = page.saturating_add(1);
        if self.controller.set_page(page) {
            format!("Loading page {}", shown)
        } else {
            format!("Already on page {}", shown)
        }
    }

    /// Totals of the `days` before `now`
    pub async fn summary(&mut self, now: DateTime<Utc>, days: i64) -> Result<String, CoreError> {
        let summary = fetch_summary(self.client.as_ref(), now, days).await;
        self.session.observe(&summary);
        Ok(render::render_summary(&summary?, &self.config.currency))
    }

    fn form_text(&self) -> String {
        match self.editor.mode() {
            Some(mode) => render::render_form(mode, self.editor.form()),
            None => String::new(),
        }
    }

    /// Read commands from stdin until `quit`, end of input or a closed session
    pub async fn run_interactive(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Type 'help' for commands.");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read from stdin")? else {
                        break;
                    };
                    let command = match parse_command(&line) {
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(message) => {
                            println!("{}", message);
                            continue;
                        }
                    };
                    let (text, quit) = self.execute(command).await;
                    if !text.is_empty() {
                        println!("{}", text);
                    }
                    if quit {
                        break;
                    }
                }
                update = self.controller.next_update() => {
                    let Some(update) = update else { break };
                    if let Some(text) = self.describe(&update) {
                        println!("{}", text);
                    }
                    if !self.session.is_open() {
                        break;
                    }
                }
            }
        }

        if !self.session.is_open() && !self.signed_out {
            println!("Session expired, sign in again.");
        }
        self.controller.unmount();
        Ok(())
    }
}

/// Print the first page of `location` once and exit
pub async fn print_once<C>(client: Arc<C>, config: Config, location: &str) -> anyhow::Result<()>
where
    C: CollectionClient<Record = Expense, Draft = ExpenseRequest> + AccountClient + 'static,
{
    let mut console = Console::open(client, config, location).await?;
    for update in console.controller.settle().await {
        if let TableUpdate::FetchFailed(e) = update {
            anyhow::bail!("Could not load expenses: {}", e);
        }
    }
    println!("{}", console.table());
    console.controller.unmount();
    Ok(())
}

/// Print the spending totals of the last `days` and exit
pub async fn print_summary<C>(client: Arc<C>, config: Config, days: i64) -> anyhow::Result<()>
where
    C: CollectionClient<Record = Expense, Draft = ExpenseRequest> + AccountClient + 'static,
{
    start_session(client.as_ref(), &config).await?;
    let summary = fetch_summary(client.as_ref(), Utc::now(), days)
        .await
        .context("Could not load the summary")?;
    println!("{}", render::render_summary(&summary, &config.currency));
    Ok(())
}
