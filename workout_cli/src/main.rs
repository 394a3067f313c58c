use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use workout_core::navigation::{self, NavigationContext};
use workout_core::variants::VariantDeletion;
use workout_core::*;

#[derive(Parser)]
#[command(name = "wplan")]
#[command(about = "Workout plan structure and navigation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Principal to act as
    #[arg(long = "as", global = true, default_value = "local")]
    principal: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty workout and print its id
    New {
        #[arg(long)]
        title: String,
    },

    /// Check a workout's structure
    Validate {
        #[arg(long)]
        workout: WorkoutId,
    },

    /// Print a workout's plan items, blocks and variants
    Show {
        #[arg(long)]
        workout: WorkoutId,
    },

    /// Resolve the current position and its neighbours
    Nav {
        #[arg(long)]
        workout: WorkoutId,

        /// Plan item the athlete is on (omit to start the workout)
        #[arg(long)]
        item: Option<PlanItemId>,

        #[arg(long, requires = "protocol")]
        exercise: Option<ExerciseId>,

        #[arg(long, requires = "exercise")]
        protocol: Option<ProtocolId>,

        #[arg(long)]
        variant_item: Option<VariantItemId>,

        #[arg(long)]
        program: Option<ProgramId>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Block authoring
    #[command(subcommand)]
    Block(BlockCommands),

    /// Variant authoring
    #[command(subcommand)]
    Variant(VariantCommands),
}

#[derive(Subcommand)]
enum BlockCommands {
    /// Append a block with its default variant A
    Add {
        #[arg(long)]
        workout: WorkoutId,

        #[arg(long)]
        name: String,

        #[arg(long)]
        rounds: Option<u32>,
    },
}

#[derive(Subcommand)]
enum VariantCommands {
    /// Add an empty variant to a block
    Add {
        #[arg(long)]
        workout: WorkoutId,

        #[arg(long)]
        block: BlockId,

        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a variant (refused for a block's last variant)
    Delete {
        #[arg(long)]
        workout: WorkoutId,

        #[arg(long)]
        variant: VariantId,
    },

    /// Copy a variant and its items under the next label
    Duplicate {
        #[arg(long)]
        workout: WorkoutId,

        #[arg(long)]
        variant: VariantId,
    },

    /// Change a variant's label
    Relabel {
        #[arg(long)]
        workout: WorkoutId,

        #[arg(long)]
        variant: VariantId,

        #[arg(long)]
        label: String,
    },

    /// Make a variant the block's active one
    Select {
        #[arg(long)]
        workout: WorkoutId,

        #[arg(long)]
        block: BlockId,

        #[arg(long)]
        label: String,
    },

    /// Append an exercise/protocol pairing to a variant
    AddItem {
        #[arg(long)]
        workout: WorkoutId,

        #[arg(long)]
        variant: VariantId,

        #[arg(long)]
        exercise: ExerciseId,

        #[arg(long)]
        protocol: ProtocolId,
    },
}

fn main() -> ExitCode {
    workout_core::logging::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error[{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let snapshot_dir = cli
        .data_dir
        .map(|dir| dir.join("workouts"))
        .unwrap_or_else(|| config.snapshot_dir());
    let store = JsonSnapshotStore::with_access(snapshot_dir, config.access_control());
    let principal = Principal::new(cli.principal);
    tracing::debug!("Using snapshot directory {:?} as {}", store.dir(), principal);

    match cli.command {
        Commands::New { title } => cmd_new(&store, &principal, title),
        Commands::Validate { workout } => cmd_validate(&store, &principal, workout),
        Commands::Show { workout } => cmd_show(&store, &principal, workout),
        Commands::Nav {
            workout,
            item,
            exercise,
            protocol,
            variant_item,
            program,
            json,
        } => {
            let cursor = item.map(|item| NavigationCursor {
                plan_item_id: item,
                exercise_id: exercise,
                protocol_id: protocol,
                variant_item_id: variant_item,
                program_id: program,
            });
            cmd_nav(&store, &principal, workout, cursor, program, json)
        }
        Commands::Block(BlockCommands::Add {
            workout,
            name,
            rounds,
        }) => edit(&store, &principal, workout, |snapshot| {
            let plan = plan_block_creation(workout, &snapshot.plan_items, name, rounds)?;
            let report = vec![
                format!("✓ Block {} added", plan.block.id),
                format!("  Variant A: {}", plan.default_variant.id),
            ];
            Ok((MutationPlan::CreateBlock(plan), report))
        }),
        Commands::Variant(command) => cmd_variant(&store, &principal, command),
    }
}

fn cmd_new(store: &JsonSnapshotStore, principal: &Principal, title: String) -> Result<()> {
    let mut snapshot = WorkoutSnapshot::new(Workout {
        id: WorkoutId::generate(),
        title,
        archived: false,
    });
    store.save(principal, &mut snapshot)?;
    println!("{}", snapshot.workout.id);
    Ok(())
}

fn cmd_validate(
    store: &JsonSnapshotStore,
    principal: &Principal,
    workout: WorkoutId,
) -> Result<()> {
    let snapshot = store.fetch(principal, workout)?;
    let errors = snapshot.validate();
    if errors.is_empty() {
        println!("✓ Workout {} is consistent", workout);
        return Ok(());
    }

    eprintln!("Structure violations:");
    for error in &errors {
        eprintln!("  - {}", error);
    }
    Err(Error::StructureInconsistent(format!(
        "{} violation(s) in workout '{}'",
        errors.len(),
        workout
    )))
}

fn cmd_show(
    store: &JsonSnapshotStore,
    principal: &Principal,
    workout: WorkoutId,
) -> Result<()> {
    let tree = PlanTree::load(store.fetch(principal, workout)?)?;

    println!("{}", tree.workout().title);
    if let Some(captured_at) = tree.captured_at() {
        println!("(snapshot from {})", captured_at);
    }
    for item in tree.ordered_plan_items() {
        match &item.kind {
            PlanItemKind::Exercise { exercise_id, .. } => {
                println!(
                    "{:>4}  exercise  {}",
                    item.sort_order,
                    exercise_name(&tree, *exercise_id)
                );
            }
            PlanItemKind::Block { block_id } => {
                let block = tree.block(*block_id)?;
                let active = tree.active_variant(*block_id)?;
                println!("{:>4}  block     {} ({})", item.sort_order, block.name, block_id);
                for variant in tree.variants_of(*block_id)? {
                    let marker = if variant.id == active.id { "*" } else { " " };
                    println!("        {} {} ({})", marker, variant.label, variant.id);
                    for vi in tree.items_of(variant.id)? {
                        println!("            - {}", exercise_name(&tree, vi.exercise_id));
                    }
                }
            }
            PlanItemKind::Rest {
                content,
                duration_seconds,
            } => match duration_seconds {
                Some(seconds) => println!(
                    "{:>4}  rest      {}s {}",
                    item.sort_order, seconds, content
                ),
                None => println!("{:>4}  rest      {}", item.sort_order, content),
            },
            PlanItemKind::Info { content } => {
                println!("{:>4}  info      {}", item.sort_order, content);
            }
        }
    }
    Ok(())
}

fn cmd_nav(
    store: &JsonSnapshotStore,
    principal: &Principal,
    workout: WorkoutId,
    cursor: Option<NavigationCursor>,
    program: Option<ProgramId>,
    json: bool,
) -> Result<()> {
    let tree = PlanTree::load(store.fetch(principal, workout)?)?;
    let outcome = match cursor {
        Some(cursor) => navigation::resolve(&tree, &cursor)?,
        None => navigation::start(&tree, program)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let nav = match outcome {
        NavigationOutcome::EmptyWorkout => {
            println!("Nothing to do: workout has no exercises or blocks");
            return Ok(());
        }
        NavigationOutcome::Resolved(nav) => nav,
    };

    match &nav.context {
        NavigationContext::Outside => println!("Outside any block"),
        NavigationContext::InsideBlockVariant {
            block_name,
            rounds,
            variant_label,
            ..
        } => match rounds {
            Some(rounds) => println!(
                "Block {} · variant {} · {} rounds",
                block_name, variant_label, rounds
            ),
            None => println!("Block {} · variant {}", block_name, variant_label),
        },
    }
    println!("  Current:  {}", describe_position(&tree, &nav.current));
    println!("  Next:     {}", describe_step(&tree, &nav.next));
    println!("  Previous: {}", describe_step(&tree, &nav.previous));
    Ok(())
}

fn cmd_variant(
    store: &JsonSnapshotStore,
    principal: &Principal,
    command: VariantCommands,
) -> Result<()> {
    match command {
        VariantCommands::Add {
            workout,
            block,
            name,
        } => edit(store, principal, workout, |snapshot| {
            let variants = snapshot.variants_of(block);
            if variants.is_empty() {
                return Err(Error::NotFound(format!("Block '{}'", block)));
            }
            let active = snapshot.active_label(block);
            let plan = plan_variant_creation(block, &variants, active.as_deref(), name)?;
            let mut report = vec![format!(
                "✓ Variant {} added ({})",
                plan.variant.label, plan.variant.id
            )];
            report.extend(relabel_lines(&plan.relabels));
            Ok((MutationPlan::CreateVariant(plan), report))
        }),
        VariantCommands::Delete { workout, variant } => {
            edit(store, principal, workout, |snapshot| {
                let plan = deletion_plan(snapshot, variant)?;
                let report: Vec<String> = plan
                    .new_active_label
                    .iter()
                    .map(|label| format!("✓ Variant deleted, active variant is {}", label))
                    .collect();
                Ok((MutationPlan::DeleteVariant(plan), report))
            })
        }
        VariantCommands::Duplicate { workout, variant } => {
            edit(store, principal, workout, |snapshot| {
                let block = block_of(snapshot, variant)?;
                let variants = snapshot.variants_of(block);
                let active = snapshot.active_label(block);
                let plan = plan_variant_duplication(
                    variant,
                    &variants,
                    &snapshot.variant_items,
                    active.as_deref(),
                )?;
                let mut report = vec![format!(
                    "✓ Variant duplicated as {} ({}) with {} items",
                    plan.variant.label,
                    plan.variant.id,
                    plan.items.len()
                )];
                report.extend(relabel_lines(&plan.relabels));
                Ok((MutationPlan::DuplicateVariant(plan), report))
            })
        }
        VariantCommands::Relabel {
            workout,
            variant,
            label,
        } => edit(store, principal, workout, |snapshot| {
            let block = block_of(snapshot, variant)?;
            let variants = snapshot.variants_of(block);
            let active = snapshot.active_label(block).unwrap_or_default();
            let plan = plan_variant_relabel(variant, &variants, &label, &active)?;
            let report = vec![format!(
                "✓ Variant {} is now {}",
                plan.relabel.from, plan.relabel.to
            )];
            Ok((MutationPlan::RelabelVariant(plan), report))
        }),
        VariantCommands::Select {
            workout,
            block,
            label,
        } => {
            let mut snapshot = store.fetch(principal, workout)?;
            if !snapshot
                .variants
                .iter()
                .any(|v| v.block_id == block && v.label == label)
            {
                return Err(Error::InvalidParameters(format!(
                    "Block '{}' has no variant '{}'",
                    block, label
                )));
            }
            snapshot.active_variants.insert(block, label.clone());
            store.save(principal, &mut snapshot)?;
            println!("✓ Variant {} is now active", label);
            Ok(())
        }
        VariantCommands::AddItem {
            workout,
            variant,
            exercise,
            protocol,
        } => edit(store, principal, workout, |snapshot| {
            block_of(snapshot, variant)?;
            let item =
                plan_variant_item_append(variant, &snapshot.variant_items, exercise, protocol);
            let report = vec![format!("✓ Item {} added", item.id)];
            Ok((MutationPlan::AppendItem(item), report))
        }),
    }
}

/// Run an edit and print its report once the snapshot is saved
fn edit<F>(
    store: &JsonSnapshotStore,
    principal: &Principal,
    workout: WorkoutId,
    plan: F,
) -> Result<()>
where
    F: FnOnce(&WorkoutSnapshot) -> Result<(MutationPlan, Vec<String>)>,
{
    for line in plan_and_save(store, principal, workout, plan)? {
        println!("{}", line);
    }
    Ok(())
}

/// Fetch, plan, apply and save; the report comes back only after the save
fn plan_and_save<F>(
    store: &JsonSnapshotStore,
    principal: &Principal,
    workout: WorkoutId,
    plan: F,
) -> Result<Vec<String>>
where
    F: FnOnce(&WorkoutSnapshot) -> Result<(MutationPlan, Vec<String>)>,
{
    let mut snapshot = store.fetch(principal, workout)?;
    let (mutation, report) = plan(&snapshot)?;
    snapshot.apply(&mutation)?;
    store.save(principal, &mut snapshot)?;
    Ok(report)
}

fn deletion_plan(snapshot: &WorkoutSnapshot, variant: VariantId) -> Result<VariantDeletion> {
    let block = block_of(snapshot, variant)?;
    let variants = snapshot.variants_of(block);
    let active = snapshot.active_label(block).unwrap_or_default();
    let plan = plan_variant_deletion(variant, &variants, &active)?;
    if !plan.allowed {
        return Err(Error::InvalidParameters(format!(
            "Variant '{}' is the only variant of block '{}'",
            variant, block
        )));
    }
    Ok(plan)
}

fn block_of(snapshot: &WorkoutSnapshot, variant: VariantId) -> Result<BlockId> {
    snapshot
        .variants
        .iter()
        .find(|v| v.id == variant)
        .map(|v| v.block_id)
        .ok_or_else(|| Error::NotFound(format!("Variant '{}'", variant)))
}

fn relabel_lines(relabels: &[variants::Relabel]) -> Vec<String> {
    relabels
        .iter()
        .map(|relabel| format!("  Relabelled {} → {}", relabel.from, relabel.to))
        .collect()
}

fn exercise_name(tree: &PlanTree, id: ExerciseId) -> String {
    tree.exercise(id)
        .map(|e| e.title.clone())
        .unwrap_or_else(|| id.to_string())
}

fn describe_position(tree: &PlanTree, position: &Position) -> String {
    match position {
        Position::Exercise { plan_item_id, .. } => format!(
            "{} (item {})",
            exercise_name(tree, position.exercise_id()),
            plan_item_id
        ),
        Position::BlockItem {
            index,
            item_count,
            variant_item_id,
            protocol_id,
            ..
        } => {
            let protocol = tree
                .protocol(*protocol_id)
                .map(|p| format!(" [{}]", p.name))
                .unwrap_or_default();
            format!(
                "{}{} ({}/{}, variant item {})",
                exercise_name(tree, position.exercise_id()),
                protocol,
                index + 1,
                item_count,
                variant_item_id
            )
        }
    }
}

fn describe_step(tree: &PlanTree, step: &Step) -> String {
    match step {
        Step::At(position) => describe_position(tree, position),
        Step::EndOfWorkout => "end of workout".into(),
        Step::StartOfWorkout => "start of workout".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stored_workout(store: &JsonSnapshotStore, principal: &Principal) -> WorkoutSnapshot {
        let mut snapshot = WorkoutSnapshot::new(Workout {
            id: WorkoutId::generate(),
            title: "Edits".into(),
            archived: false,
        });
        store.save(principal, &mut snapshot).unwrap();
        snapshot
    }

    #[test]
    fn test_failed_apply_returns_no_report() {
        let temp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(temp.path());
        let principal = Principal::new("local");
        let before = stored_workout(&store, &principal);
        let workout = before.workout.id;

        let result = plan_and_save(&store, &principal, workout, |snapshot| {
            let item = variants::plan_variant_item_append(
                VariantId::generate(),
                &snapshot.variant_items,
                ExerciseId::generate(),
                ProtocolId::generate(),
            );
            Ok((MutationPlan::AppendItem(item), vec!["✓ Item added".into()]))
        });

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.fetch(&principal, workout).unwrap(), before);
    }

    #[test]
    fn test_report_follows_save() {
        let temp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(temp.path());
        let principal = Principal::new("local");
        let workout = stored_workout(&store, &principal).workout.id;

        let report = plan_and_save(&store, &principal, workout, |snapshot| {
            let plan = plan_block_creation(workout, &snapshot.plan_items, "Circuit", Some(3))?;
            Ok((MutationPlan::CreateBlock(plan), vec!["✓ Block added".into()]))
        })
        .unwrap();

        assert_eq!(report, vec!["✓ Block added".to_string()]);
        let saved = store.fetch(&principal, workout).unwrap();
        assert_eq!(saved.blocks.len(), 1);
    }
}
