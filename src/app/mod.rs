//! Terminal presentation layer.
//!
//! A home screen over the saved-games mapping (new / continue / delete)
//! and a game screen that feeds player text to the engine and renders the
//! committed snapshots. All rendering is plain stdout; everything the
//! player types arrives through a [`TranscriptSource`] so the same loop
//! works for typed or dictated input.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Local, TimeZone};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::engine::{GameEngine, SubmitOutcome};
use crate::error::{AppError, AppResult};
use crate::session::{GameSession, Speaker, SOLVE_MARKER};
use crate::storage::{SessionStore, SqliteStorage};
use crate::transcript::TranscriptSource;

/// Shown when mystery creation fails, whatever the underlying cause.
const CREATE_ERROR: &str = "No se pudo crear un nuevo misterio. Por favor, verifica tu conexión o la configuración de la API y vuelve a intentarlo.";

/// Shown when an action fails for any reason other than image filtering.
const ACTION_ERROR: &str = "Hubo un error al procesar tu acción. Inténtalo de nuevo.";

/// Shown when image synthesis returned zero images.
const NO_IMAGES_ERROR: &str = "No se pudo generar la imagen para la escena. La respuesta de la API no contenía imágenes. Esto puede deberse a filtros de seguridad. Intenta con una acción diferente.";

const SOLVED_BANNER: &str = "¡Misterio resuelto!";

/// The interactive application.
pub struct App {
    config: Config,
    storage: SqliteStorage,
    engine: GameEngine<SqliteStorage>,
}

impl App {
    /// Create the application
    pub fn new(config: Config, storage: SqliteStorage, engine: GameEngine<SqliteStorage>) -> Self {
        Self {
            config,
            storage,
            engine,
        }
    }

    /// Run the home-screen loop until the player quits or input ends.
    pub async fn run(&self, input: &mut dyn TranscriptSource) -> AppResult<()> {
        input.start()?;

        // Loaded once; corrupt data already degraded to an empty mapping
        let mut saved = self.storage.load_all().await?;

        loop {
            self.render_home(&saved);

            let Some(line) = input.next_transcript().await else {
                break;
            };
            let trimmed = line.trim();
            let (command, arg) = match trimmed.split_once(char::is_whitespace) {
                Some((c, a)) => (c, a.trim()),
                None => (trimmed, ""),
            };

            match command.to_lowercase().as_str() {
                "" => {}
                "salir" => break,
                "nueva" => match self.engine.new_game().await {
                    Ok(session) => {
                        saved.insert(session.id.clone(), session.clone());
                        self.play(session, &mut saved, input).await?;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to create a new game");
                        println!("\n{}\n", CREATE_ERROR);
                    }
                },
                "continuar" => {
                    if let Some(id) = pick_session_id(&saved, arg) {
                        let session = saved[&id].clone();
                        self.play(session, &mut saved, input).await?;
                    } else {
                        println!("\nNo existe esa partida.\n");
                    }
                }
                "borrar" => {
                    if let Some(id) = pick_session_id(&saved, arg) {
                        println!("\n¿Estás seguro de que quieres borrar esta partida? Esta acción no se puede deshacer. (s/n)");
                        if let Some(answer) = input.next_transcript().await {
                            if is_affirmative(&answer) {
                                self.storage.delete_one(&id).await?;
                                saved.remove(&id);
                                println!("Partida borrada.\n");
                            }
                        }
                    } else {
                        println!("\nNo existe esa partida.\n");
                    }
                }
                _ => println!("\nComandos: nueva | continuar <n> | borrar <n> | salir\n"),
            }
        }

        input.stop();
        Ok(())
    }

    /// Game-screen loop for one session.
    async fn play(
        &self,
        mut session: GameSession,
        saved: &mut HashMap<String, GameSession>,
        input: &mut dyn TranscriptSource,
    ) -> AppResult<()> {
        if !self.storage.tutorial_seen(&session.id).await? {
            print_tutorial();
            self.storage.mark_tutorial_seen(&session.id).await?;
        }

        // The autosave task reads whatever snapshot is current at fire
        // time, so a committed turn is never clobbered by an older copy.
        let shared = Arc::new(RwLock::new(session.clone()));
        let autosave = spawn_autosave(
            self.storage.clone(),
            Arc::clone(&shared),
            self.config.game.autosave_interval_secs,
        );

        self.render_scene(&session);

        loop {
            println!(
                "\n¿Qué quieres hacer, detective? Para resolver, escribe: {} [tu solución]",
                SOLVE_MARKER
            );
            println!("Comandos: :pistas | :guardar | :tutorial | :volver");

            let Some(line) = input.next_transcript().await else {
                break;
            };

            match line.trim() {
                ":volver" => break,
                ":pistas" => render_clues(&session),
                ":tutorial" => print_tutorial(),
                ":guardar" => {
                    self.storage.save_one(&session).await?;
                    println!("Progreso guardado ✓");
                }
                _ => {
                    if session.solved {
                        println!("{}", SOLVED_BANNER);
                        continue;
                    }
                    match self.engine.submit_action(&session, &line).await {
                        Ok(SubmitOutcome::Ignored) => {}
                        Ok(SubmitOutcome::Updated(next)) => {
                            session = next;
                            *shared.write().await = session.clone();
                            saved.insert(session.id.clone(), session.clone());
                            self.render_turn(&session);
                            println!("Progreso guardado ✓");
                            if session.solved {
                                println!("\n{}", SOLVED_BANNER);
                            }
                        }
                        Err(e) => {
                            error!(error = %e, session_id = %session.id, "Action failed");
                            println!("\n{}", action_error_message(&e));
                        }
                    }
                }
            }
        }

        autosave.abort();

        // Save before leaving the game screen
        self.storage.save_one(&session).await?;
        saved.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn render_home(&self, saved: &HashMap<String, GameSession>) {
        println!("\n=== Misterio en el Concejo ===");
        println!("Una aventura de detectives en Córdoba.\n");
        println!("Partidas Guardadas");

        let games = sorted_sessions(saved);
        if games.is_empty() {
            println!("  No hay partidas guardadas.");
        } else {
            for (i, game) in games.iter().enumerate() {
                let solved = if game.solved { " [resuelta]" } else { "" };
                println!(
                    "  {}. {}{} - Iniciada: {}",
                    i + 1,
                    game.mystery.title,
                    solved,
                    format_created_at(game.created_at)
                );
            }
        }

        println!("\nComandos: nueva | continuar <n> | borrar <n> | salir");
    }

    fn render_scene(&self, session: &GameSession) {
        println!("\n=== {} ===\n", session.mystery.title);
        println!("{}", session.current_narration);
        self.note_scene_image(session);
        println!("\nPistas encontradas: {}", session.clues.len());
        if session.solved {
            println!("{}", SOLVED_BANNER);
        }
    }

    /// Print what the last committed turn added.
    fn render_turn(&self, session: &GameSession) {
        if let Some(message) = session.history.last() {
            if message.speaker == Speaker::Narrator {
                println!("\n{}", message.text);
            }
        }
        self.note_scene_image(session);
        println!("\nPistas encontradas: {}", session.clues.len());
    }

    /// Export the current scene image and tell the player where it is.
    fn note_scene_image(&self, session: &GameSession) {
        if let Some(path) = self.export_scene_image(session) {
            println!("\nImagen de la escena: {}", path.display());
        }
    }

    /// Write the session's current image to disk for viewing. Export
    /// problems are logged, never surfaced - the turn itself already
    /// committed.
    fn export_scene_image(&self, session: &GameSession) -> Option<PathBuf> {
        let data_url = session.current_image.as_deref()?;
        let bytes = match decode_data_url(data_url) {
            Some(bytes) => bytes,
            None => {
                warn!(session_id = %session.id, "Current image is not a decodable data URL");
                return None;
            }
        };

        let dir = &self.config.game.image_dir;
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(error = %e, "Failed to create image directory");
            return None;
        }

        let path = dir.join(format!("{}.jpg", session.id));
        match std::fs::write(&path, bytes) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to export scene image");
                None
            }
        }
    }
}

/// Saved sessions, newest first.
fn sorted_sessions(saved: &HashMap<String, GameSession>) -> Vec<&GameSession> {
    let mut games: Vec<&GameSession> = saved.values().collect();
    games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    games
}

/// Resolve a 1-based index from the newest-first listing to a session id.
fn pick_session_id(saved: &HashMap<String, GameSession>, arg: &str) -> Option<String> {
    let index: usize = arg.parse().ok()?;
    let games = sorted_sessions(saved);
    games.get(index.checked_sub(1)?).map(|g| g.id.clone())
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "s" | "si" | "sí")
}

/// Map an action failure to its user-facing message. Zero-image results
/// get the content-filter hint; everything else gets the generic text.
fn action_error_message(err: &AppError) -> &'static str {
    if err.is_no_images() {
        NO_IMAGES_ERROR
    } else {
        ACTION_ERROR
    }
}

/// Decode a `data:<mime>;base64,<payload>` reference.
fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let (_, payload) = data_url.split_once(',')?;
    STANDARD.decode(payload).ok()
}

fn format_created_at(created_at: i64) -> String {
    Local
        .timestamp_millis_opt(created_at)
        .single()
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| created_at.to_string())
}

fn print_tutorial() {
    println!("\n--- Tutorial ---");
    println!("La narración y las imágenes del misterio aparecen en pantalla. Lee con atención cada detalle.");
    println!("Con :pistas consultas en cualquier momento las pistas que hayas encontrado.");
    println!("Escribe tus preguntas, acciones o la solución final directamente en el cursor.");
    println!(
        "Para resolver el caso, empieza tu mensaje con {} seguido de tu acusación.",
        SOLVE_MARKER
    );
    println!("Cada acción avanza la investigación y guarda tu progreso automáticamente.");
    println!("----------------\n");
}

fn render_clues(session: &GameSession) {
    println!("\nPistas ({})", session.clues.len());
    if session.clues.is_empty() {
        println!("  Aún no has encontrado ninguna pista.");
    } else {
        for clue in &session.clues {
            println!("  - {}", clue);
        }
    }
}

/// Persist the latest snapshot of the active session on a fixed cadence.
/// Uses the same save path as every other write; a failed tick only logs.
fn spawn_autosave(
    storage: SqliteStorage,
    shared: Arc<RwLock<GameSession>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // interval fires immediately; the first save is not due yet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = shared.read().await.clone();
            match storage.save_one(&snapshot).await {
                Ok(()) => debug!(session_id = %snapshot.id, "Periodic autosave"),
                Err(e) => {
                    warn!(error = %e, session_id = %snapshot.id, "Periodic autosave failed")
                }
            }
        }
    })
}
