//! The CDCL search engine.
//!
//! One [`Solver`] owns the clause arena, watch lists, trail, activity heap
//! and restart/reduction schedules. The search loop interleaves unit
//! propagation, theory checks, conflict analysis with First-UIP learning,
//! non-chronological backtracking, Luby restarts and clause-database
//! reduction.
//!
//! Theory state is kept in lock-step with the trail: a fresh decision level
//! is mirrored through [`TheoryCallback::push_level`] and every backtrack
//! through [`TheoryCallback::pop_levels`].

use crate::clause::{ClauseDb, ClauseId};
use crate::heap::VarHeap;
use crate::literal::{LBool, Lit, Var};
use crate::restart::{RestartScheduler, RestartStrategy};
use crate::theory::{NullTheory, TheoryActions, TheoryCallback};
use crate::trail::{Reason, Trail};
use crate::watch::WatchLists;
use ferrite_core::proof::{rules, ProofTracer, StepId, StepTable};
use ferrite_core::resource::ResourceManager;
use smallvec::SmallVec;
use tracing::{debug, trace};

type LitVec = SmallVec<[Lit; 4]>;

/// Outcome of a solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverResult {
    /// A satisfying assignment was found (and survived the theory's final
    /// check).
    Sat,
    /// The clauses (together with the assumptions, if any) are
    /// unsatisfiable.
    Unsat,
    /// The search was aborted by a resource limit or an interrupt.
    Unknown,
}

/// Tunable search parameters.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// EVSIDS variable activity decay.
    pub var_decay: f64,
    /// Clause activity decay.
    pub clause_decay: f64,
    /// Restart policy.
    pub restart: RestartStrategy,
    /// Remember the last assigned polarity of each variable.
    pub phase_saving: bool,
    /// Fraction of decisions taken on a random variable.
    pub random_var_freq: f64,
    /// Seed for the decision rng.
    pub seed: u64,
    /// Learned clauses tolerated before the first reduction.
    pub first_reduce_limit: usize,
    /// Growth factor of the reduction threshold.
    pub reduce_growth: f64,
    /// Enable learned-clause minimization.
    pub minimize_learned: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            var_decay: 0.95,
            clause_decay: 0.999,
            restart: RestartStrategy::default(),
            phase_saving: true,
            random_var_freq: 0.0,
            seed: 0x93c4_67e3_7db0_c7a4,
            first_reduce_limit: 2000,
            reduce_growth: 1.3,
            minimize_learned: true,
        }
    }
}

/// Search statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    /// Conflicts encountered.
    pub conflicts: u64,
    /// Decisions made.
    pub decisions: u64,
    /// Literals propagated.
    pub propagations: u64,
    /// Restarts performed.
    pub restarts: u64,
    /// Clause-database reductions.
    pub reductions: u64,
    /// Clauses learned.
    pub learned_clauses: u64,
    /// Learned clauses removed by reduction.
    pub removed_clauses: u64,
    /// Literals propagated by the theory.
    pub theory_propagations: u64,
    /// Conflicts raised by the theory.
    pub theory_conflicts: u64,
}

/// A CDCL SAT solver with theory hooks.
pub struct Solver {
    config: SolverConfig,
    stats: SolverStats,

    db: ClauseDb,
    watches: WatchLists,
    trail: Trail,

    heap: VarHeap,
    activity: Vec<f64>,
    var_inc: f64,
    phase: Vec<bool>,

    seen: Vec<bool>,
    analyze_toclear: Vec<Var>,

    learned: Vec<ClauseId>,
    reduce_limit: f64,
    restart: RestartScheduler,
    restart_pending: bool,

    /// False once a root-level conflict was derived.
    ok: bool,
    unsat_step: StepId,

    model: Vec<LBool>,
    conflict_core: Vec<Lit>,

    /// Trail prefix already streamed to the theory.
    theory_head: usize,

    resources: ResourceManager,
    tracer: Option<StepTable>,
    rng: u64,
}

impl Solver {
    /// A solver with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    /// A solver with the given parameters.
    #[must_use]
    pub fn with_config(config: SolverConfig) -> Self {
        let restart = RestartScheduler::new(config.restart);
        let reduce_limit = config.first_reduce_limit as f64;
        let rng = config.seed | 1;
        Self {
            db: ClauseDb::new(config.clause_decay),
            watches: WatchLists::new(),
            trail: Trail::new(),
            heap: VarHeap::new(),
            activity: Vec::new(),
            var_inc: 1.0,
            phase: Vec::new(),
            seen: Vec::new(),
            analyze_toclear: Vec::new(),
            learned: Vec::new(),
            reduce_limit,
            restart,
            restart_pending: false,
            ok: true,
            unsat_step: StepId::NONE,
            model: Vec::new(),
            conflict_core: Vec::new(),
            theory_head: 0,
            resources: ResourceManager::new(),
            tracer: None,
            rng,
            config,
            stats: SolverStats::default(),
        }
    }

    /// Install resource limits polled during the search.
    pub fn set_resources(&mut self, resources: ResourceManager) {
        self.resources = resources;
    }

    /// Start recording proof steps.
    pub fn enable_proofs(&mut self) {
        if self.tracer.is_none() {
            self.tracer = Some(StepTable::new());
        }
    }

    /// The recorded proof steps, if proofs are enabled.
    #[must_use]
    pub fn proof(&self) -> Option<&StepTable> {
        self.tracer.as_ref()
    }

    /// Proof step of the root-level empty clause after an unsat answer.
    #[must_use]
    pub fn unsat_proof(&self) -> StepId {
        self.unsat_step
    }

    /// Search statistics.
    #[must_use]
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Size hint: reserve capacity for `n` additional variables.
    pub fn reserve_vars(&mut self, n: usize) {
        self.activity.reserve(n);
        self.phase.reserve(n);
        self.seen.reserve(n);
    }

    /// Create a fresh variable with default polarity `false`.
    pub fn new_var(&mut self) -> Var {
        self.new_var_default(false)
    }

    /// Create a fresh variable with the given default polarity.
    pub fn new_var_default(&mut self, default_pol: bool) -> Var {
        let v = self.trail.new_var();
        let n = self.trail.num_vars();
        self.watches.grow_to(n);
        self.heap.grow_to(n);
        self.activity.push(0.0);
        self.phase.push(default_pol);
        self.seen.push(false);
        self.heap.insert(v, &self.activity);
        v
    }

    /// Number of variables.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.trail.num_vars()
    }

    /// Current assignment of a literal.
    #[must_use]
    pub fn value(&self, lit: Lit) -> LBool {
        self.trail.value(lit)
    }

    /// The model of the last sat answer, indexed by variable.
    #[must_use]
    pub fn model(&self) -> &[LBool] {
        &self.model
    }

    /// Subset of the assumptions responsible for the last unsat answer
    /// under assumptions.
    #[must_use]
    pub fn unsat_core(&self) -> &[Lit] {
        &self.conflict_core
    }

    /// The trail as currently assigned (oldest first).
    #[must_use]
    pub fn trail(&self) -> &[Lit] {
        self.trail.as_slice()
    }

    /// Current decision level.
    #[must_use]
    pub fn decision_level(&self) -> u32 {
        self.trail.decision_level()
    }

    fn trace_step(&mut self, rule: &'static str, premises: &[StepId], lits: &[Lit]) -> StepId {
        match &mut self.tracer {
            Some(t) => {
                let lits: Vec<ferrite_core::Lit> = lits
                    .iter()
                    .map(|l| ferrite_core::Lit::from_raw(l.raw()))
                    .collect();
                t.add_step(rule, premises, &lits, &[])
            }
            None => StepId::NONE,
        }
    }

    /// Add a clause at the root level. Returns false when the clause made
    /// the problem unsatisfiable.
    pub fn add_clause<I>(&mut self, lits: I) -> bool
    where
        I: IntoIterator<Item = Lit>,
    {
        debug_assert_eq!(
            self.trail.decision_level(),
            0,
            "clauses are asserted at the root level"
        );
        if !self.ok {
            return false;
        }
        let mut v: LitVec = lits.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        // A sorted clause holds p and not-p in adjacent slots.
        for i in 1..v.len() {
            if v[i].var() == v[i - 1].var() {
                return true;
            }
        }
        let step = self.trace_step(rules::INPUT, &[], &v);
        let mut out: LitVec = LitVec::new();
        for &l in &v {
            match self.trail.value(l) {
                LBool::True => return true,
                LBool::False => {}
                LBool::Undef => out.push(l),
            }
        }
        match out.len() {
            0 => {
                self.ok = false;
                self.unsat_step = self.trace_step(rules::UNSAT, &[step], &[]);
                false
            }
            1 => {
                let l = out[0];
                let cid = self.db.alloc(out, false, step);
                self.trail.assign(l, Reason::Propagation(cid));
                true
            }
            _ => {
                let (w0, w1) = (out[0], out[1]);
                let cid = self.db.alloc(out, false, step);
                self.watches.attach(w0, cid, w1);
                self.watches.attach(w1, cid, w0);
                true
            }
        }
    }

    /// Solve without a theory or assumptions.
    pub fn solve(&mut self) -> SolverResult {
        self.solve_with_theory(&mut NullTheory, &[])
    }

    /// Solve without a theory, under the given assumptions.
    pub fn solve_with_assumptions(&mut self, assumptions: &[Lit]) -> SolverResult {
        self.solve_with_theory(&mut NullTheory, assumptions)
    }

    /// Solve with a theory, under the given assumptions. Assumptions behave
    /// as forced decisions at levels `1..=k` and are reported in
    /// [`Solver::unsat_core`] when they are the cause of unsatisfiability.
    pub fn solve_with_theory(
        &mut self,
        th: &mut dyn TheoryCallback,
        assumptions: &[Lit],
    ) -> SolverResult {
        self.conflict_core.clear();
        if !self.ok {
            return SolverResult::Unsat;
        }
        debug_assert_eq!(self.trail.decision_level(), 0);
        let result = self.search(th, assumptions);
        self.cancel_until(th, 0);
        debug!(
            ?result,
            conflicts = self.stats.conflicts,
            decisions = self.stats.decisions,
            "solve finished"
        );
        result
    }

    fn search(&mut self, th: &mut dyn TheoryCallback, assumptions: &[Lit]) -> SolverResult {
        loop {
            if !self.resources.check(self.stats.conflicts).is_ok() {
                debug!("resource limit reached, aborting search");
                return SolverResult::Unknown;
            }

            if let Some(cid) = self.propagate() {
                if self.db.is_learned(cid) {
                    self.db.bump(cid);
                }
                let lits: LitVec = self.db.lits(cid).iter().copied().collect();
                let step = self.db.proof(cid);
                if !self.handle_conflict(th, &lits, step) {
                    return SolverResult::Unsat;
                }
                continue;
            }

            // Propagation quiesced: stream the trail to the theory and run
            // a partial check.
            self.theory_sync(th);
            let mut acts = TheoryActions::new(self.num_vars() as u32);
            th.partial_check(&mut acts);
            if !acts.is_empty() {
                match self.apply_actions(th, acts) {
                    CheckOutcome::Conflict(clause, step) => {
                        if !self.handle_conflict(th, &clause, step) {
                            return SolverResult::Unsat;
                        }
                        continue;
                    }
                    CheckOutcome::Progress => continue,
                    CheckOutcome::Quiet => {}
                }
            }

            if self.restart_pending {
                self.restart_pending = false;
                self.restart.on_restart();
                self.stats.restarts += 1;
                debug!(restarts = self.stats.restarts, "restart");
                self.cancel_until(th, 0);
                continue;
            }

            if self.learned.len() as f64 > self.reduce_limit {
                self.reduce_db();
                self.reduce_limit *= self.config.reduce_growth;
            }

            // Replay pending assumptions as forced decisions.
            let mut next_decision: Option<Lit> = None;
            while (self.trail.decision_level() as usize) < assumptions.len() {
                let a = assumptions[self.trail.decision_level() as usize];
                match self.trail.value(a) {
                    LBool::True => {
                        // Already implied; open an empty level to keep the
                        // assumption/level correspondence.
                        self.trail.push_level();
                        th.push_level();
                    }
                    LBool::False => {
                        self.analyze_final(th, a);
                        return SolverResult::Unsat;
                    }
                    LBool::Undef => {
                        next_decision = Some(a);
                        break;
                    }
                }
            }

            if next_decision.is_none() {
                match self.pick_branch_var() {
                    Some(v) => {
                        next_decision = Some(Lit::from_var(v, self.phase[v.index()]));
                    }
                    None => {
                        // Complete assignment: ask the theory to confirm.
                        self.theory_sync(th);
                        let mut acts = TheoryActions::new(self.num_vars() as u32);
                        th.final_check(&mut acts);
                        if acts.is_empty() {
                            self.model = self.trail.assignments().to_vec();
                            return SolverResult::Sat;
                        }
                        match self.apply_actions(th, acts) {
                            CheckOutcome::Conflict(clause, step) => {
                                if !self.handle_conflict(th, &clause, step) {
                                    return SolverResult::Unsat;
                                }
                            }
                            CheckOutcome::Progress => {}
                            CheckOutcome::Quiet => {
                                // Nothing the theory reported changed any
                                // state: the assignment stands.
                                self.model = self.trail.assignments().to_vec();
                                return SolverResult::Sat;
                            }
                        }
                        continue;
                    }
                }
            }

            let lit = next_decision.expect("a decision literal was chosen");
            self.stats.decisions += 1;
            trace!(%lit, level = self.trail.decision_level() + 1, "decide");
            self.trail.push_level();
            th.push_level();
            self.trail.assign(lit, Reason::Decision);
        }
    }

    /// Two-watched-literal propagation to fixpoint; returns a conflicting
    /// clause if one was found.
    fn propagate(&mut self) -> Option<ClauseId> {
        while let Some(lit) = self.trail.next_to_propagate() {
            self.stats.propagations += 1;
            let false_lit = lit.negate();
            let mut ws = std::mem::take(self.watches.get_mut(false_lit));
            let mut i = 0;
            let mut j = 0;
            'watchers: while i < ws.len() {
                let mut w = ws[i];
                i += 1;
                // Blocker shortcut: the clause is satisfied, keep the watch.
                if self.trail.value(w.blocker).is_true() {
                    ws[j] = w;
                    j += 1;
                    continue;
                }
                let cid = w.clause;
                {
                    let lits = self.db.lits_mut(cid);
                    if lits[0] == false_lit {
                        lits.swap(0, 1);
                    }
                }
                debug_assert_eq!(self.db.lits(cid)[1], false_lit);
                let first = self.db.lits(cid)[0];
                if first != w.blocker && self.trail.value(first).is_true() {
                    w.blocker = first;
                    ws[j] = w;
                    j += 1;
                    continue;
                }
                // Look for a replacement watch among positions 2..
                let len = self.db.lits(cid).len();
                for k in 2..len {
                    if !self.trail.value(self.db.lits(cid)[k]).is_false() {
                        let lits = self.db.lits_mut(cid);
                        lits.swap(1, k);
                        let new_watch = lits[1];
                        self.watches.attach(new_watch, cid, first);
                        continue 'watchers;
                    }
                }
                // No replacement: the clause is unit or conflicting.
                w.blocker = first;
                ws[j] = w;
                j += 1;
                if self.trail.value(first).is_false() {
                    while i < ws.len() {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                    ws.truncate(j);
                    *self.watches.get_mut(false_lit) = ws;
                    self.trail.set_head_to_end();
                    return Some(cid);
                }
                self.trail.assign(first, Reason::Propagation(cid));
            }
            ws.truncate(j);
            *self.watches.get_mut(false_lit) = ws;
        }
        None
    }

    /// Stream trail entries the theory has not seen yet.
    fn theory_sync(&mut self, th: &mut dyn TheoryCallback) {
        while self.theory_head < self.trail.len() {
            th.on_assume(self.trail.get(self.theory_head));
            self.theory_head += 1;
        }
    }

    fn apply_actions(
        &mut self,
        th: &mut dyn TheoryCallback,
        acts: TheoryActions,
    ) -> CheckOutcome {
        let (new_pols, props, clauses, conflict) = acts.take();
        let mut progress = false;
        for pol in new_pols {
            self.new_var_default(pol);
            progress = true;
        }
        if let Some((clause, step)) = conflict {
            self.stats.theory_conflicts += 1;
            let step = if step.is_some() {
                step
            } else {
                self.trace_step(rules::THEORY_LEMMA, &[], &clause)
            };
            return CheckOutcome::Conflict(clause, step);
        }
        let level_before = self.trail.decision_level();
        for (lits, step) in clauses {
            progress = true;
            if let Some(conflict) = self.add_theory_clause(th, lits, step) {
                return CheckOutcome::Conflict(conflict.0, conflict.1);
            }
        }
        if self.trail.decision_level() < level_before {
            // A unit lemma unwound the trail; the pending propagations were
            // derived from state that no longer exists. The theory will
            // re-derive them at the next check.
            return CheckOutcome::Progress;
        }
        for lit in props {
            match self.trail.value(lit) {
                LBool::True => {}
                LBool::Undef => {
                    self.stats.theory_propagations += 1;
                    self.trail.assign(lit, Reason::Theory);
                    progress = true;
                }
                LBool::False => {
                    // The theory asserts a literal that is already false:
                    // its explanation is a conflict.
                    let guards = th.explain_propagation(lit);
                    let mut clause = vec![lit];
                    clause.extend(guards.iter().map(|g| g.negate()));
                    self.stats.theory_conflicts += 1;
                    let step = self.trace_step(rules::THEORY_PROPAGATION, &[], &clause);
                    return CheckOutcome::Conflict(clause, step);
                }
            }
        }
        if progress {
            CheckOutcome::Progress
        } else {
            CheckOutcome::Quiet
        }
    }

    /// Install a clause supplied by the theory mid-search.
    ///
    /// Returns a conflict clause when the new clause is falsified by the
    /// current assignment.
    fn add_theory_clause(
        &mut self,
        th: &mut dyn TheoryCallback,
        lits: Vec<Lit>,
        proof: StepId,
    ) -> Option<(Vec<Lit>, StepId)> {
        let mut v: LitVec = lits.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        for i in 1..v.len() {
            if v[i].var() == v[i - 1].var() {
                return None; // tautology
            }
        }
        // Literals settled at the root level simplify away.
        let mut out: LitVec = LitVec::new();
        for &l in &v {
            match self.trail.value(l) {
                LBool::True if self.trail.level_of(l.var()) == 0 => return None,
                LBool::False if self.trail.level_of(l.var()) == 0 => {}
                _ => out.push(l),
            }
        }
        let step = if proof.is_some() {
            proof
        } else {
            self.trace_step(rules::THEORY_LEMMA, &[], &out)
        };
        if out.is_empty() {
            return Some((Vec::new(), step));
        }
        if out.len() == 1 {
            let l = out[0];
            // A unit lemma holds at the root; unwind before asserting it.
            self.cancel_until(th, 0);
            return match self.trail.value(l) {
                LBool::True => None,
                LBool::False => Some((vec![l], step)),
                LBool::Undef => {
                    let cid = self.db.alloc(out, false, step);
                    self.trail.assign(l, Reason::Propagation(cid));
                    None
                }
            };
        }
        self.order_watches(&mut out);
        let (w0, w1) = (out[0], out[1]);
        let conflicting = self.trail.value(w0).is_false() && self.trail.value(w1).is_false();
        let unit = self.trail.value(w0).is_undef() && self.trail.value(w1).is_false();
        let as_vec = out.to_vec();
        // Theory lemmas are axioms of the theory, not conflict-derived
        // clauses; reduction must never drop them.
        let cid = self.db.alloc(out, false, step);
        self.watches.attach(w0, cid, w1);
        self.watches.attach(w1, cid, w0);
        if conflicting {
            return Some((as_vec, step));
        }
        if unit {
            self.trail.assign(w0, Reason::Propagation(cid));
        }
        None
    }

    /// Move the two most watchable literals into positions 0 and 1:
    /// non-false literals first, then false literals by descending level.
    fn order_watches(&mut self, lits: &mut LitVec) {
        let score = |trail: &Trail, l: Lit| -> (u8, u32) {
            match trail.value(l) {
                LBool::True => (3, trail.level_of(l.var())),
                LBool::Undef => (2, 0),
                LBool::False => (1, trail.level_of(l.var())),
            }
        };
        for slot in 0..2 {
            let mut best = slot;
            for i in (slot + 1)..lits.len() {
                if score(&self.trail, lits[i]) > score(&self.trail, lits[best]) {
                    best = i;
                }
            }
            lits.swap(slot, best);
        }
    }

    /// Drive one conflict through analysis, learning, and backjumping.
    /// Returns false when the conflict proves global unsatisfiability.
    fn handle_conflict(
        &mut self,
        th: &mut dyn TheoryCallback,
        confl: &[Lit],
        confl_step: StepId,
    ) -> bool {
        self.stats.conflicts += 1;
        if self.restart.on_conflict() {
            self.restart_pending = true;
        }
        debug_assert!(
            confl.iter().all(|&l| self.trail.value(l).is_false()),
            "conflict clause literals are all false"
        );

        let conflict_level = confl
            .iter()
            .map(|l| self.trail.level_of(l.var()))
            .max()
            .unwrap_or(0);
        if conflict_level == 0 {
            self.ok = false;
            self.unsat_step = self.trace_step(rules::UNSAT, &[confl_step], &[]);
            debug!(conflicts = self.stats.conflicts, "root-level conflict");
            return false;
        }
        // A theory conflict may live entirely below the current level.
        self.cancel_until(th, conflict_level);

        let (learnt, backjump, lbd, step) = self.analyze(th, confl, confl_step);
        trace!(?learnt, backjump, "learned clause");
        self.cancel_until(th, backjump);

        self.stats.learned_clauses += 1;
        if learnt.len() == 1 {
            let l = learnt[0];
            let cid = self.db.alloc(learnt, true, step);
            self.learned.push(cid);
            self.trail.assign(l, Reason::Propagation(cid));
        } else {
            let (w0, w1) = (learnt[0], learnt[1]);
            let cid = self.db.alloc(learnt, true, step);
            self.db.set_lbd(cid, lbd);
            self.db.bump(cid);
            self.learned.push(cid);
            self.watches.attach(w0, cid, w1);
            self.watches.attach(w1, cid, w0);
            self.trail.assign(w0, Reason::Propagation(cid));
        }

        self.var_inc /= self.config.var_decay;
        self.db.decay();
        true
    }

    /// First-UIP conflict analysis.
    ///
    /// Resolves the conflict clause against reasons of current-level
    /// literals, newest first, until a single current-level literal remains.
    /// Returns the learned clause (UIP negation at position 0, the deepest
    /// remaining literal at position 1), the backjump level, the LBD, and
    /// the proof step of the derivation.
    fn analyze(
        &mut self,
        th: &mut dyn TheoryCallback,
        confl: &[Lit],
        confl_step: StepId,
    ) -> (LitVec, u32, u32, StepId) {
        let conflict_level = self.trail.decision_level();
        debug_assert!(conflict_level > 0);

        let mut learnt: LitVec = LitVec::new();
        learnt.push(Lit::from_raw(0)); // slot for the UIP
        let mut premises: SmallVec<[StepId; 4]> = SmallVec::new();
        if confl_step.is_some() {
            premises.push(confl_step);
        }

        let mut path = 0usize;
        for &q in confl {
            self.analyze_mark(q, conflict_level, &mut learnt, &mut path);
        }
        debug_assert!(path > 0, "conflict clause has a current-level literal");

        let mut idx = self.trail.len();
        let uip = loop {
            let p = loop {
                idx -= 1;
                let l = self.trail.get(idx);
                if self.seen[l.var().index()] {
                    break l;
                }
            };
            self.seen[p.var().index()] = false;
            path -= 1;
            if path == 0 {
                break p;
            }
            let (others, step) = self.reason_premise(th, p);
            if step.is_some() {
                premises.push(step);
            }
            for &q in &others {
                self.analyze_mark(q, conflict_level, &mut learnt, &mut path);
            }
        };
        learnt[0] = uip.negate();

        if self.config.minimize_learned && learnt.len() > 2 {
            self.minimize(&mut learnt);
        }

        // Backjump to the deepest level below the conflict level; keep that
        // literal in the second watch slot.
        let mut backjump = 0;
        if learnt.len() > 1 {
            let mut best = 1;
            for i in 2..learnt.len() {
                if self.trail.level_of(learnt[i].var()) > self.trail.level_of(learnt[best].var()) {
                    best = i;
                }
            }
            learnt.swap(1, best);
            backjump = self.trail.level_of(learnt[1].var());
        }

        let lbd = self.compute_lbd(&learnt);

        for &v in &self.analyze_toclear {
            self.seen[v.index()] = false;
        }
        self.analyze_toclear.clear();

        let step = self.trace_step(rules::RESOLUTION, &premises, &learnt);
        (learnt, backjump, lbd, step)
    }

    fn analyze_mark(
        &mut self,
        q: Lit,
        conflict_level: u32,
        learnt: &mut LitVec,
        path: &mut usize,
    ) {
        let v = q.var();
        let lvl = self.trail.level_of(v);
        if !self.seen[v.index()] && lvl > 0 {
            self.seen[v.index()] = true;
            self.analyze_toclear.push(v);
            self.bump_var(v);
            if lvl >= conflict_level {
                *path += 1;
            } else {
                learnt.push(q);
            }
        }
    }

    /// The non-pivot literals of `p`'s reason clause, plus its proof step.
    fn reason_premise(
        &mut self,
        th: &mut dyn TheoryCallback,
        p: Lit,
    ) -> (SmallVec<[Lit; 8]>, StepId) {
        match self.trail.reason_of(p.var()) {
            Reason::Propagation(cid) => {
                if self.db.is_learned(cid) {
                    self.db.bump(cid);
                }
                let lits = self.db.lits(cid);
                debug_assert_eq!(lits[0], p, "reason clause keeps its literal first");
                (lits[1..].iter().copied().collect(), self.db.proof(cid))
            }
            Reason::Theory => {
                let guards = th.explain_propagation(p);
                let others: SmallVec<[Lit; 8]> =
                    guards.iter().map(|g| g.negate()).collect();
                let step = if self.tracer.is_some() {
                    let mut clause = vec![p];
                    clause.extend_from_slice(&others);
                    self.trace_step(rules::THEORY_PROPAGATION, &[], &clause)
                } else {
                    StepId::NONE
                };
                (others, step)
            }
            Reason::Decision => unreachable!("resolved literal has a reason"),
        }
    }

    /// Drop a learned literal whose reason antecedents are all already in
    /// the clause (or settled at the root level).
    fn minimize(&mut self, learnt: &mut LitVec) {
        let mut j = 1;
        for i in 1..learnt.len() {
            let q = learnt[i];
            let redundant = match self.trail.reason_of(q.var()) {
                Reason::Propagation(cid) => self.db.lits(cid)[1..].iter().all(|r| {
                    let rv = r.var();
                    self.trail.level_of(rv) == 0 || self.seen[rv.index()]
                }),
                _ => false,
            };
            if !redundant {
                learnt[j] = q;
                j += 1;
            }
        }
        learnt.truncate(j);
    }

    fn compute_lbd(&self, lits: &[Lit]) -> u32 {
        let mut levels: SmallVec<[u32; 8]> = lits
            .iter()
            .map(|l| self.trail.level_of(l.var()))
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels.len() as u32
    }

    /// Compute the subset of assumptions responsible for the falsified
    /// assumption `a`, into `conflict_core`.
    fn analyze_final(&mut self, th: &mut dyn TheoryCallback, a: Lit) {
        self.conflict_core.clear();
        self.conflict_core.push(a);
        if self.trail.decision_level() == 0 {
            return;
        }
        let mut to_clear: Vec<Var> = Vec::new();
        self.seen[a.var().index()] = true;
        to_clear.push(a.var());
        for idx in (0..self.trail.len()).rev() {
            let lit = self.trail.get(idx);
            let v = lit.var();
            if self.trail.level_of(v) == 0 {
                break;
            }
            if !self.seen[v.index()] {
                continue;
            }
            match self.trail.reason_of(v) {
                Reason::Decision => {
                    // A decision in the chain is an assumption.
                    self.conflict_core.push(lit);
                }
                Reason::Propagation(cid) => {
                    for &r in &self.db.lits(cid)[1..] {
                        let rv = r.var();
                        if self.trail.level_of(rv) > 0 && !self.seen[rv.index()] {
                            self.seen[rv.index()] = true;
                            to_clear.push(rv);
                        }
                    }
                }
                Reason::Theory => {
                    for g in th.explain_propagation(lit) {
                        let gv = g.var();
                        if self.trail.level_of(gv) > 0 && !self.seen[gv.index()] {
                            self.seen[gv.index()] = true;
                            to_clear.push(gv);
                        }
                    }
                }
            }
        }
        for v in to_clear {
            self.seen[v.index()] = false;
        }
    }

    fn bump_var(&mut self, v: Var) {
        self.activity[v.index()] += self.var_inc;
        if self.activity[v.index()] > 1e100 {
            for a in &mut self.activity {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
        self.heap.update(v, &self.activity);
    }

    fn cancel_until(&mut self, th: &mut dyn TheoryCallback, level: u32) {
        let current = self.trail.decision_level();
        if current <= level {
            return;
        }
        let phase_saving = self.config.phase_saving;
        let heap = &mut self.heap;
        let phase = &mut self.phase;
        let activity = &self.activity;
        self.trail.pop_to(level, |lit| {
            let v = lit.var();
            if phase_saving {
                phase[v.index()] = lit.is_positive();
            }
            heap.insert(v, activity);
        });
        th.pop_levels((current - level) as usize);
        self.theory_head = self.theory_head.min(self.trail.len());
    }

    fn next_random(&mut self) -> u64 {
        // xorshift64
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }

    fn pick_branch_var(&mut self) -> Option<Var> {
        if self.config.random_var_freq > 0.0 {
            let roll = (self.next_random() >> 11) as f64 / (1u64 << 53) as f64;
            if roll < self.config.random_var_freq && self.num_vars() > 0 {
                let v = Var::new((self.next_random() % self.num_vars() as u64) as u32);
                if self.trail.value_var(v).is_undef() {
                    return Some(v);
                }
            }
        }
        while let Some(v) = self.heap.pop(&self.activity) {
            if self.trail.value_var(v).is_undef() {
                return Some(v);
            }
        }
        None
    }

    /// Whether `cid` is the reason of a trail entry.
    fn is_reason(&self, cid: ClauseId) -> bool {
        let first = self.db.lits(cid)[0];
        self.trail.value(first).is_true()
            && self.trail.reason_of(first.var()) == Reason::Propagation(cid)
    }

    /// Remove the lowest-activity half of the learned clauses, keeping
    /// binary clauses and clauses currently used as reasons.
    fn reduce_db(&mut self) {
        self.stats.reductions += 1;
        let db = &self.db;
        let mut cands: Vec<ClauseId> = self
            .learned
            .iter()
            .copied()
            .filter(|&cid| {
                !db.is_deleted(cid) && db.lits(cid).len() > 2 && !self.is_reason(cid)
            })
            .collect();
        cands.sort_by(|&a, &b| {
            db.activity(a)
                .partial_cmp(&db.activity(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let target = cands.len() / 2;
        for &cid in cands.iter().take(target) {
            let (w0, w1) = {
                let lits = self.db.lits(cid);
                (lits[0], lits[1])
            };
            self.watches.detach(w0, cid);
            self.watches.detach(w1, cid);
            self.db.free(cid);
            self.stats.removed_clauses += 1;
        }
        let db = &self.db;
        self.learned.retain(|&cid| !db.is_deleted(cid));
        debug!(
            removed = target,
            remaining = self.learned.len(),
            "clause database reduced"
        );
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

enum CheckOutcome {
    /// The theory had nothing to say.
    Quiet,
    /// New variables, clauses or propagations were installed; re-propagate.
    Progress,
    /// A conflict clause (all literals false) and its proof step.
    Conflict(Vec<Lit>, StepId),
}
