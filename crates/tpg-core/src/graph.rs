//! `TangledProgramGraph`: the graph store and the single edge-maintenance
//! chokepoint, per `spec.md` §4.1-§4.4.
//!
//! Entities live in ID-keyed tables (`programs`, `teams`); every
//! cross-reference is by [`ProgramId`]/[`TeamId`], never a direct reference.
//! [`TangledProgramGraph::set_team_action`] is the only function permitted to
//! write a team's `action_map` or any entity's `in_edges`/`out_edges` -
//! everything else that touches edges (team construction, removal, copying)
//! routes through it so invariants I1-I7 hold inductively.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use rand::Rng;

use crate::backend::ProgramBackend;
use crate::entity::{Genome, Program, Team};
use crate::error::TpgError;
use crate::id::{ProgramId, TeamId};

/// The graph: all programs, all teams, the designated root teams, and the
/// action set programs are drawn from.
///
/// `A` is the action type (an opaque label the harness interprets); `X` is
/// the decoded executable type a [`ProgramBackend`] produces.
#[derive(Debug, Clone)]
pub struct TangledProgramGraph<A, X> {
    programs: HashMap<ProgramId, Program<A, X>>,
    teams: HashMap<TeamId, Team>,
    root_teams: IndexSet<TeamId>,
    actions: Vec<A>,
    next_program_id: u64,
    next_team_id: u64,
}

impl<A, X> TangledProgramGraph<A, X> {
    /// Creates an empty graph with the given action set.
    pub fn new(actions: Vec<A>) -> Self {
        TangledProgramGraph {
            programs: HashMap::new(),
            teams: HashMap::new(),
            root_teams: IndexSet::new(),
            actions,
            next_program_id: 1,
            next_team_id: 1,
        }
    }

    /// The graph's current action set.
    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    /// Replaces the action set wholesale. Programs holding an action no
    /// longer present keep holding it (`Program::action` is not validated
    /// against the live set after construction), which is why this emits a
    /// warning: existing bidders can strand an action nothing can add going
    /// forward via `add_program`'s validation.
    pub fn update_actions(&mut self, new_set: Vec<A>) {
        tracing::warn!(
            previous_len = self.actions.len(),
            new_len = new_set.len(),
            "replacing action set; in-flight programs may hold actions no longer present"
        );
        self.actions = new_set;
    }

    /// Read access to a program by ID.
    pub fn program(&self, id: ProgramId) -> Option<&Program<A, X>> {
        self.programs.get(&id)
    }

    /// Read access to a team by ID.
    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    /// Mutable access to a program by ID. Crate-internal: evaluation needs
    /// to populate the lazy decode cache, which isn't otherwise a public
    /// mutation.
    pub(crate) fn program_mut(&mut self, id: ProgramId) -> Option<&mut Program<A, X>> {
        self.programs.get_mut(&id)
    }

    /// All program IDs currently in the graph.
    pub fn program_ids(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.programs.keys().copied()
    }

    /// All team IDs currently in the graph.
    pub fn team_ids(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.teams.keys().copied()
    }

    /// The designated root teams, in the order they were added.
    pub fn root_teams(&self) -> &IndexSet<TeamId> {
        &self.root_teams
    }

    /// Registers `team_id` as a root. Errors if the team doesn't exist.
    pub fn add_root(&mut self, team_id: TeamId) -> Result<(), TpgError> {
        if !self.teams.contains_key(&team_id) {
            return Err(TpgError::TeamNotFound { id: team_id });
        }
        self.root_teams.insert(team_id);
        Ok(())
    }

    /// Demotes `team_id` from root status. A no-op if it wasn't a root or no
    /// longer exists.
    pub fn remove_root(&mut self, team_id: TeamId) {
        self.root_teams.shift_remove(&team_id);
    }

    /// Adds a new team containing exactly `program_ids` (no duplicates,
    /// every ID must already exist), then applies `action_map` entries
    /// through [`Self::set_team_action`] so the new team's edges are
    /// recorded consistently from the start.
    pub fn add_team(
        &mut self,
        program_ids: Vec<ProgramId>,
        action_map: Option<IndexMap<ProgramId, TeamId>>,
    ) -> Result<TeamId, TpgError> {
        let mut members = IndexSet::new();
        for pid in &program_ids {
            if !self.programs.contains_key(pid) {
                return Err(TpgError::ProgramNotFound { id: *pid });
            }
            if !members.insert(*pid) {
                return Err(TpgError::DuplicateProgramInTeam { program: *pid });
            }
        }

        let id = TeamId(self.next_team_id);
        self.next_team_id += 1;
        self.teams.insert(id, Team::new(id, members));
        for pid in &program_ids {
            self.programs
                .get_mut(pid)
                .expect("validated above")
                .in_edges_mut()
                .insert(id);
        }

        if let Some(map) = action_map {
            for (pid, dest) in map {
                self.set_team_action(id, pid, Some(dest))?;
            }
        }
        Ok(id)
    }

    /// The single writer of `action_map`, `in_edges`, and `out_edges`.
    ///
    /// Sets (or clears, if `dest` is `None`) the destination team that
    /// `program_id` maps to within `team_id`. `program_id` must already be a
    /// member of `team_id`. Rejects a self-loop (`dest == Some(team_id)`,
    /// I6). A `dest` equal to the program's current mapping is a no-op.
    ///
    /// After updating `team_id`'s own `action_map`, this reconciles the
    /// derived edge sets: `team_id.out_edges` and the old/new destination's
    /// `in_edges` reflect whether *any* entry in `team_id.action_map` still
    /// points there; `program_id.out_edges` reflects whether *any* team
    /// containing `program_id` still maps it to that destination.
    pub fn set_team_action(
        &mut self,
        team_id: TeamId,
        program_id: ProgramId,
        dest: Option<TeamId>,
    ) -> Result<(), TpgError> {
        if let Some(d) = dest {
            if d == team_id {
                return Err(TpgError::SelfLoopRejected { team: team_id });
            }
            if !self.teams.contains_key(&d) {
                return Err(TpgError::TeamNotFound { id: d });
            }
        }
        if !self.teams.contains_key(&team_id) {
            return Err(TpgError::TeamNotFound { id: team_id });
        }
        if !self.programs.contains_key(&program_id) {
            return Err(TpgError::ProgramNotFound { id: program_id });
        }
        let team = self.teams.get(&team_id).expect("checked above");
        if !team.programs().contains(&program_id) {
            return Err(TpgError::ProgramNotInTeam {
                team: team_id,
                program: program_id,
            });
        }

        let old_dest = team.action_map().get(&program_id).copied();
        if old_dest == dest {
            return Ok(());
        }

        match dest {
            Some(d) => {
                self.teams
                    .get_mut(&team_id)
                    .expect("checked above")
                    .action_map_mut()
                    .insert(program_id, d);
            }
            None => {
                self.teams
                    .get_mut(&team_id)
                    .expect("checked above")
                    .action_map_mut()
                    .shift_remove(&program_id);
            }
        }

        if let Some(old) = old_dest {
            let team_still_points_there = self
                .teams
                .get(&team_id)
                .expect("checked above")
                .action_map()
                .values()
                .any(|&v| v == old);
            if !team_still_points_there {
                self.teams
                    .get_mut(&team_id)
                    .expect("checked above")
                    .out_edges_mut()
                    .shift_remove(&old);
                if let Some(old_team) = self.teams.get_mut(&old) {
                    old_team.in_edges_mut().shift_remove(&team_id);
                }
            }

            let owning_teams: Vec<TeamId> = self
                .programs
                .get(&program_id)
                .expect("checked above")
                .in_edges()
                .iter()
                .copied()
                .collect();
            let program_still_points_there = owning_teams.iter().any(|tid| {
                self.teams
                    .get(tid)
                    .map(|t| t.action_map().get(&program_id) == Some(&old))
                    .unwrap_or(false)
            });
            if !program_still_points_there {
                self.programs
                    .get_mut(&program_id)
                    .expect("checked above")
                    .out_edges_mut()
                    .shift_remove(&old);
            }
        }

        if let Some(new_dest) = dest {
            self.teams
                .get_mut(&team_id)
                .expect("checked above")
                .out_edges_mut()
                .insert(new_dest);
            self.teams
                .get_mut(&new_dest)
                .expect("checked above")
                .in_edges_mut()
                .insert(team_id);
            self.programs
                .get_mut(&program_id)
                .expect("checked above")
                .out_edges_mut()
                .insert(new_dest);
        }

        Ok(())
    }

    /// Adds an already-existing program to a team's membership. Used by the
    /// mutation operators to place a freshly minted or freshly copied
    /// program, rather than rebuilding the team from scratch.
    pub fn add_program_to_team(
        &mut self,
        team_id: TeamId,
        program_id: ProgramId,
    ) -> Result<(), TpgError> {
        if !self.teams.contains_key(&team_id) {
            return Err(TpgError::TeamNotFound { id: team_id });
        }
        if !self.programs.contains_key(&program_id) {
            return Err(TpgError::ProgramNotFound { id: program_id });
        }
        let inserted = self
            .teams
            .get_mut(&team_id)
            .expect("checked above")
            .programs_mut()
            .insert(program_id);
        if !inserted {
            return Err(TpgError::DuplicateProgramInTeam { program: program_id });
        }
        self.programs
            .get_mut(&program_id)
            .expect("checked above")
            .in_edges_mut()
            .insert(team_id);
        Ok(())
    }

    /// Removes `program_id` from `team_id`'s membership, clearing its
    /// action-map entry first (through [`Self::set_team_action`]) so the
    /// derived edge sets stay consistent.
    pub fn remove_program_from_team(
        &mut self,
        team_id: TeamId,
        program_id: ProgramId,
    ) -> Result<(), TpgError> {
        let team = self
            .teams
            .get(&team_id)
            .ok_or(TpgError::TeamNotFound { id: team_id })?;
        if !team.programs().contains(&program_id) {
            return Err(TpgError::ProgramNotInTeam {
                team: team_id,
                program: program_id,
            });
        }

        self.set_team_action(team_id, program_id, None)?;
        self.teams
            .get_mut(&team_id)
            .expect("checked above")
            .programs_mut()
            .shift_remove(&program_id);
        self.programs
            .get_mut(&program_id)
            .expect("checked above")
            .in_edges_mut()
            .shift_remove(&team_id);
        Ok(())
    }

    /// Removes a team entirely. Refuses if the team still has incoming
    /// edges unless `force` is set (the garbage collector passes `force`
    /// for confirmed orphans, whose remaining incoming edges, if any, come
    /// only from other orphans being removed in the same sweep).
    ///
    /// Clears the back-reference in each outgoing destination's `in_edges`,
    /// removes every member program (via
    /// [`Self::remove_program_from_team`], which itself clears this team's
    /// `action_map` entries through the edge primitive), demotes it from
    /// root status, then deletes the team record.
    pub fn remove_team(&mut self, team_id: TeamId, force: bool) -> Result<(), TpgError> {
        let team = self
            .teams
            .get(&team_id)
            .ok_or(TpgError::TeamNotFound { id: team_id })?;
        if !team.in_edges().is_empty() && !force {
            return Err(TpgError::TeamHasIncomingEdges {
                team: team_id,
                incoming: team.in_edges().len(),
            });
        }

        let outgoing: Vec<TeamId> = team.out_edges().iter().copied().collect();
        for dest in outgoing {
            if let Some(dest_team) = self.teams.get_mut(&dest) {
                dest_team.in_edges_mut().shift_remove(&team_id);
            }
        }

        let members: Vec<ProgramId> = self
            .teams
            .get(&team_id)
            .expect("checked above")
            .programs()
            .iter()
            .copied()
            .collect();
        for program_id in members {
            self.remove_program_from_team(team_id, program_id)?;
        }

        self.root_teams.shift_remove(&team_id);
        self.teams.remove(&team_id);
        Ok(())
    }

    /// Deletes a program's record outright. Only valid for a program with
    /// no owning teams (`in_edges` empty) - the garbage collector's
    /// definition of an orphaned program. Does not touch any evaluation
    /// cache; the caller is responsible for purging cached bids.
    pub fn remove_orphan_program(&mut self, program_id: ProgramId) -> Result<(), TpgError> {
        let program = self
            .programs
            .get(&program_id)
            .ok_or(TpgError::ProgramNotFound { id: program_id })?;
        if !program.in_edges().is_empty() {
            return Err(TpgError::InvalidMutationConfig {
                reason: format!(
                    "program {program_id} still belongs to {} team(s), not an orphan",
                    program.in_edges().len()
                ),
            });
        }
        self.programs.remove(&program_id);
        Ok(())
    }

    /// Copies a team: a fresh ID, the same program membership (shared, not
    /// copied - programs are reference data), and the same action map,
    /// reapplied entry by entry through [`Self::add_team`] /
    /// [`Self::set_team_action`] so the copy's edges are independent of the
    /// original's from the start.
    pub fn copy_team(&mut self, team_id: TeamId) -> Result<TeamId, TpgError> {
        let original = self
            .teams
            .get(&team_id)
            .ok_or(TpgError::TeamNotFound { id: team_id })?;
        let program_ids: Vec<ProgramId> = original.programs().iter().copied().collect();
        let action_map = original.action_map().clone();
        self.add_team(program_ids, Some(action_map))
    }
}

impl<A: Clone + PartialEq, X> TangledProgramGraph<A, X> {
    /// Adds a new program with the given genome.
    ///
    /// If `action` is `Some`, it must already be a member of the graph's
    /// action set. If `action` is `None` and the action set is non-empty, a
    /// uniformly random action is drawn from it via `rng`; if the action set
    /// is empty the program is created action-less.
    pub fn add_program(
        &mut self,
        genome: Genome,
        action: Option<A>,
        rng: &mut impl Rng,
    ) -> Result<ProgramId, TpgError> {
        let resolved = match action {
            Some(a) => {
                if !self.actions.iter().any(|existing| existing == &a) {
                    return Err(TpgError::ActionNotInSet);
                }
                Some(a)
            }
            None if self.actions.is_empty() => None,
            None => {
                let idx = rng.gen_range(0..self.actions.len());
                Some(self.actions[idx].clone())
            }
        };
        let id = ProgramId(self.next_program_id);
        self.next_program_id += 1;
        self.programs.insert(id, Program::new(id, genome, resolved));
        Ok(id)
    }
}

impl<A: Clone, X> TangledProgramGraph<A, X> {
    /// Copies a program: a fresh ID, the backend's `deep_copy` of its
    /// genome, and the same action. The copy starts with no edges; it is
    /// the caller's job (the mutation operator) to place it in a team.
    pub fn copy_program<B>(
        &mut self,
        program_id: ProgramId,
        backend: &B,
    ) -> Result<ProgramId, TpgError>
    where
        B: ProgramBackend<Executable = X>,
    {
        let original = self
            .programs
            .get(&program_id)
            .ok_or(TpgError::ProgramNotFound { id: program_id })?;
        let genome = backend.deep_copy(original.genome());
        let action = original.action().cloned();
        let id = ProgramId(self.next_program_id);
        self.next_program_id += 1;
        self.programs.insert(id, Program::new(id, genome, action));
        Ok(id)
    }
}
