use std::path::{Path, PathBuf};

use async_recursion::async_recursion;
use bitflags::bitflags;

use crate::completion::{CompleteFlags, Completion};
use crate::context::ExpandContext;
use crate::error::{self, ParseErrorList, SOURCE_LOCATION_UNKNOWN};
use crate::escape::{
    self, ANY_CHAR, ANY_STRING, ANY_STRING_RECURSIVE, BRACE_BEGIN, BRACE_END, BRACE_SEP,
    HOME_DIRECTORY, INTERNAL_SEPARATOR, PROCESS_EXPAND, VARIABLE_EXPAND, VARIABLE_EXPAND_EMPTY,
    VARIABLE_EXPAND_SINGLE,
};
use crate::jobs::JobManager;
use crate::patterns::{self, WildcardResult};
use crate::users;
use crate::variables::valid_var_name_char;

bitflags! {
    /// Set of flags controlling expansion.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ExpandFlags: u16 {
        /// Produce completion candidates, not final arguments. Parsing is
        /// permissive and candidates may carry descriptions.
        const FOR_COMPLETIONS = 1 << 0;
        /// Fail if the input contains a command substitution.
        const SKIP_CMDSUBST = 1 << 1;
        /// Leave `$` markers literal.
        const SKIP_VARIABLES = 1 << 2;
        /// Turn wildcard markers back into literal characters instead of
        /// matching the filesystem.
        const SKIP_WILDCARDS = 1 << 3;
        /// Leave a leading `~` literal.
        const SKIP_HOME_DIRECTORIES = 1 << 4;
        /// Do not consult the job table for `%` expansion.
        const SKIP_JOBS = 1 << 5;
        /// The caller is resolving executables; wildcard matching is
        /// disabled outright.
        const EXECUTABLES_ONLY = 1 << 6;
        /// Resolve non-absolute patterns against `CDPATH`.
        const SPECIAL_FOR_CD = 1 << 7;
        /// Resolve non-absolute patterns against the command search path.
        const SPECIAL_FOR_COMMAND = 1 << 8;
        /// Suppress completion descriptions.
        const NO_DESCRIPTIONS = 1 << 9;
    }
}

/// Non-error results of an expansion. The wildcard variants report whether
/// a wildcard in the input matched anything; hard failures are reported as
/// [`error::Error`] instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExpandResult {
    Ok,
    WildcardMatch,
    WildcardNoMatch,
}

/// The word in process expansion denoting the shell itself.
const SELF_STR: &str = "self";
/// The word in process expansion denoting the last background job.
const LAST_STR: &str = "last";

const COMPLETE_JOB_DESC: &str = "Job";
const COMPLETE_CHILD_PROCESS_DESC: &str = "Child process";
const COMPLETE_PROCESS_DESC: &str = "Process";
const COMPLETE_SELF_DESC: &str = "Shell process";
const COMPLETE_LAST_DESC: &str = "Last background job";

/// Characters which make a string unclean if they are the first character.
const UNCLEAN_FIRST: &str = "~%";
/// Characters which make a string unclean in any position.
const UNCLEAN: &str = "$*?\\\"'({})";

/// Test if the argument is clean, i.e. contains nothing that expansion
/// would alter. Most arguments are clean, and skipping the pipeline for
/// them avoids a fair amount of string shuffling.
fn expand_is_clean(input: &str) -> bool {
    if input.is_empty() {
        return true;
    }

    if input.starts_with(|c| UNCLEAN_FIRST.contains(c)) {
        return false;
    }

    !input.chars().any(|c| UNCLEAN.contains(c))
}

/// Expand `input` through command substitution, variable expansion, brace
/// expansion, tilde and process expansion, and wildcard matching, in that
/// order, appending the results to `out_completions`. Positional
/// diagnostics accumulate in `errors`; hard failures abort the pipeline.
pub async fn expand_string(
    input: &str,
    out_completions: &mut Vec<Completion>,
    flags: ExpandFlags,
    ctx: &ExpandContext<'_>,
    errors: &mut ParseErrorList,
) -> Result<ExpandResult, error::Error> {
    // Early out. If we're not completing and there's no magic in the
    // input, we're done.
    if !flags.contains(ExpandFlags::FOR_COMPLETIONS) && expand_is_clean(input) {
        out_completions.push(Completion::from_completion(input));
        return Ok(ExpandResult::Ok);
    }

    let mut expander = Expander {
        ctx,
        flags,
        errors,
    };
    expander.expand(input, out_completions).await
}

/// Expand to exactly one argument, in place. Fails if expansion errors or
/// produces anything other than a single result.
pub async fn expand_one(
    word: &mut String,
    flags: ExpandFlags,
    ctx: &ExpandContext<'_>,
    errors: &mut ParseErrorList,
) -> bool {
    if !flags.contains(ExpandFlags::FOR_COMPLETIONS) && expand_is_clean(word) {
        return true;
    }

    let mut completions = vec![];
    let result = expand_string(
        word,
        &mut completions,
        flags | ExpandFlags::NO_DESCRIPTIONS,
        ctx,
        errors,
    )
    .await;

    if result.is_ok() && completions.len() == 1 {
        *word = completions.remove(0).completion;
        true
    } else {
        false
    }
}

/// Perform tilde expansion and nothing else on `input`, in place.
pub fn expand_tilde(input: &mut String, env: &crate::env::ShellEnvironment) {
    if input.starts_with('~') {
        input.replace_range(0..1, HOME_DIRECTORY.to_string().as_str());
        expand_home_directory(input, env);
    }
}

/// Display-time inverse of tilde expansion for absolute paths.
pub fn replace_home_directory_with_tilde(s: &str, env: &crate::env::ShellEnvironment) -> String {
    let mut result = s.to_owned();

    if result.starts_with('/') {
        let mut home_directory = String::from("~");
        expand_tilde(&mut home_directory, env);
        // No home at all (e.g. HOME unset); don't replace anything.
        if home_directory.is_empty() {
            return result;
        }
        if !home_directory.ends_with('/') {
            home_directory.push('/');
        }

        if let Some(rest) = result.strip_prefix(home_directory.as_str()) {
            result = format!("~/{rest}");
        }
    }

    result
}

enum ExpansionStage {
    CommandSubstitution,
    Variables,
    Braces,
    HomeAndProcess,
    Wildcards,
}

struct Expander<'a, 'b> {
    ctx: &'a ExpandContext<'b>,
    flags: ExpandFlags,
    errors: &'a mut ParseErrorList,
}

impl<'a, 'b> Expander<'a, 'b> {
    async fn expand(
        &mut self,
        input: &str,
        out_completions: &mut Vec<Completion>,
    ) -> Result<ExpandResult, error::Error> {
        let stages = [
            ExpansionStage::CommandSubstitution,
            ExpansionStage::Variables,
            ExpansionStage::Braces,
            ExpansionStage::HomeAndProcess,
            ExpansionStage::Wildcards,
        ];

        // Load up our single initial completion; each stage consumes the
        // previous stage's output list.
        let mut completions = vec![Completion::from_completion(input)];
        let mut total_result = ExpandResult::Ok;

        for stage in stages {
            let mut output = vec![];

            for comp in completions {
                if self.ctx.cancel.is_cancelled() {
                    return Err(error::Error::Cancelled);
                }

                let this_result = match &stage {
                    ExpansionStage::CommandSubstitution => {
                        self.stage_cmdsubst(&comp.completion, &mut output).await?
                    }
                    ExpansionStage::Variables => {
                        self.stage_variables(&comp.completion, &mut output).await?
                    }
                    ExpansionStage::Braces => self.stage_braces(&comp.completion, &mut output)?,
                    ExpansionStage::HomeAndProcess => {
                        self.stage_home_and_process(&comp.completion, &mut output)
                            .await?
                    }
                    ExpansionStage::Wildcards => {
                        self.stage_wildcards(&comp.completion, &mut output)?
                    }
                };

                // A positive wildcard match dominates a later no-match
                // from the same batch.
                if !(this_result == ExpandResult::WildcardNoMatch
                    && total_result == ExpandResult::WildcardMatch)
                {
                    total_result = this_result;
                }
            }

            completions = output;
        }

        if !self.flags.contains(ExpandFlags::SKIP_HOME_DIRECTORIES) {
            self.unexpand_tildes(input, &mut completions);
        }

        out_completions.append(&mut completions);
        Ok(total_result)
    }

    //
    // Stage 1: command substitution.
    //

    async fn stage_cmdsubst(
        &mut self,
        input: &str,
        out: &mut Vec<Completion>,
    ) -> Result<ExpandResult, error::Error> {
        if self.flags.contains(ExpandFlags::SKIP_CMDSUBST) {
            let chars: Vec<char> = input.chars().collect();
            return match locate_cmdsubst(&chars) {
                CmdsubSearch::None => {
                    out.push(Completion::from_completion(input));
                    Ok(ExpandResult::Ok)
                }
                _ => {
                    error::append_cmdsub_error(
                        self.errors,
                        SOURCE_LOCATION_UNKNOWN,
                        "Command substitutions not allowed",
                    );
                    Err(error::Error::CmdSubstitutionNotAllowed)
                }
            };
        }

        self.expand_cmdsubst(input.to_owned(), out).await?;
        Ok(ExpandResult::Ok)
    }

    #[async_recursion]
    async fn expand_cmdsubst(
        &mut self,
        input: String,
        out: &mut Vec<Completion>,
    ) -> Result<(), error::Error> {
        let chars: Vec<char> = input.chars().collect();

        let (paren_begin, paren_end) = match locate_cmdsubst(&chars) {
            CmdsubSearch::None => {
                out.push(Completion::from_completion(input));
                return Ok(());
            }
            CmdsubSearch::Parens { begin, end } => (begin, end),
            CmdsubSearch::Unbalanced => {
                error::append_syntax_error(
                    self.errors,
                    SOURCE_LOCATION_UNKNOWN,
                    "Mismatched parenthesis",
                );
                return Err(error::Error::MismatchedParenthesis);
            }
        };

        let subcmd: String = chars[paren_begin + 1..paren_end].iter().collect();
        let output = match self.ctx.executor.exec_subshell(&subcmd).await {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!("command substitution failed: {err}");
                error::append_cmdsub_error(
                    self.errors,
                    paren_begin,
                    "Unknown error while evaluating command substitution",
                );
                return Err(error::Error::CmdSubstitutionFailed);
            }
        };

        if output.truncated {
            error::append_cmdsub_error(
                self.errors,
                paren_begin,
                "Too much data emitted by command substitution so it was discarded",
            );
            return Err(error::Error::CmdSubstitutionOverflow);
        }

        let mut sub_res = output.lines;

        // Apply any slice like (cat /var/words)[1].
        let mut tail_begin = paren_end + 1;
        if chars.get(tail_begin) == Some(&'[') {
            match parse_slice(&chars[tail_begin..], sub_res.len()) {
                Ok((indexes, consumed)) => {
                    let mut sliced = vec![];
                    for index in indexes {
                        if index >= 1 && (index as usize) <= sub_res.len() {
                            sliced.push(sub_res[index as usize - 1].clone());
                        }
                    }
                    sub_res = sliced;
                    tail_begin += consumed;
                }
                Err(bad_pos) => {
                    error::append_syntax_error(
                        self.errors,
                        tail_begin + bad_pos,
                        "Invalid index value",
                    );
                    return Err(error::Error::InvalidSliceIndex);
                }
            }
        }

        // Recurse on the tail to expand any remaining substitutions, then
        // emit the Cartesian product of the two result sets.
        let tail: String = chars[tail_begin..].iter().collect();
        let mut tail_expand = vec![];
        self.expand_cmdsubst(tail, &mut tail_expand).await?;

        let prefix: String = chars[..paren_begin].iter().collect();
        for sub_item in &sub_res {
            // Escaped so the variable stage's unescape reproduces the line
            // verbatim; the separators keep it from gluing onto adjacent
            // tokens.
            let escaped = escape::escape_script(sub_item);
            for tail_item in &tail_expand {
                let mut whole_item = String::with_capacity(
                    prefix.len() + escaped.len() + tail_item.completion.len() + 2,
                );
                whole_item.push_str(&prefix);
                whole_item.push(INTERNAL_SEPARATOR);
                whole_item.push_str(&escaped);
                whole_item.push(INTERNAL_SEPARATOR);
                whole_item.push_str(&tail_item.completion);
                out.push(Completion::from_completion(whole_item));
            }
        }

        Ok(())
    }

    //
    // Stage 2: variable expansion.
    //

    async fn stage_variables(
        &mut self,
        input: &str,
        out: &mut Vec<Completion>,
    ) -> Result<ExpandResult, error::Error> {
        // Decode the user's escapes and quoting into sentinel form. We
        // accept incomplete strings here, since the completion engine
        // expands words the user is still typing.
        let next = escape::unescape_script(input);

        if self.flags.contains(ExpandFlags::SKIP_VARIABLES) {
            let next: String = next
                .chars()
                .map(|c| {
                    if c == VARIABLE_EXPAND || c == VARIABLE_EXPAND_SINGLE {
                        '$'
                    } else {
                        c
                    }
                })
                .collect();
            out.push(Completion::from_completion(next));
            return Ok(ExpandResult::Ok);
        }

        let len = next.chars().count();
        self.expand_variables(next, out, len).await?;
        Ok(ExpandResult::Ok)
    }

    /// Expand variable markers right to left, rebuilding the string for
    /// each list element and recursing at the marker position. `last_idx`
    /// is where the previous call finished; pass the char count to process
    /// a string fully.
    #[async_recursion]
    async fn expand_variables(
        &mut self,
        instr: String,
        out: &mut Vec<Completion>,
        last_idx: usize,
    ) -> Result<(), error::Error> {
        let chars: Vec<char> = instr.chars().collect();
        debug_assert!(last_idx <= chars.len(), "invalid last_idx");

        // Locate the last variable marker before last_idx.
        let mut is_single = false;
        let mut varexp_char_idx = None;
        for i in (0..last_idx.min(chars.len())).rev() {
            let c = chars[i];
            if c == VARIABLE_EXPAND || c == VARIABLE_EXPAND_SINGLE {
                is_single = c == VARIABLE_EXPAND_SINGLE;
                varexp_char_idx = Some(i);
                break;
            }
        }
        let Some(varexp_char_idx) = varexp_char_idx else {
            out.push(Completion::from_completion(instr));
            return Ok(());
        };

        // Read the variable name.
        let var_name_start = varexp_char_idx + 1;
        let mut var_name_stop = var_name_start;
        while var_name_stop < chars.len() {
            let nc = chars[var_name_stop];
            if nc == VARIABLE_EXPAND_EMPTY {
                var_name_stop += 1;
                break;
            }
            if !valid_var_name_char(nc) {
                break;
            }
            var_name_stop += 1;
        }

        let var_name: String = chars[var_name_start..var_name_stop].iter().collect();
        if var_name.is_empty() {
            error::append_syntax_error(
                self.errors,
                varexp_char_idx,
                "Expected a variable name after this $",
            );
            return Err(error::Error::MissingVariableName);
        }

        let is_empty_placeholder =
            var_name.len() == VARIABLE_EXPAND_EMPTY.len_utf8() && var_name.starts_with(VARIABLE_EXPAND_EMPTY);

        // Source the value list: `history` goes to the history store
        // (reachable only through the main-thread handle), everything else
        // to the environment.
        let is_history = var_name == "history";
        let mut history_size = None;
        if is_history {
            if let Some(handle) = &self.ctx.main_thread {
                history_size = handle.perform(|state| state.history.size()).await;
            }
        }
        let history_available = history_size.is_some();

        let var = if is_history || is_empty_placeholder {
            None
        } else {
            self.ctx.env.get(&var_name).cloned()
        };

        // Parse out any following slice.
        let mut var_name_and_slice_stop = var_name_stop;
        let mut all_values = true;
        let mut var_idx_list: Vec<i64> = vec![];
        if chars.get(var_name_stop) == Some(&'[') {
            all_values = false;
            // A missing variable behaves as though it has one value, so
            // that $var[1] always works.
            let effective_val_count = if let Some(var) = &var {
                var.to_list().len()
            } else if let Some(size) = history_size {
                size
            } else {
                1
            };

            match parse_slice(&chars[var_name_stop..], effective_val_count) {
                Ok((indexes, consumed)) => {
                    var_idx_list = indexes;
                    var_name_and_slice_stop = var_name_stop + consumed;
                }
                Err(bad_pos) => {
                    error::append_syntax_error(
                        self.errors,
                        var_name_stop + bad_pos,
                        "Invalid index value",
                    );
                    return Err(error::Error::InvalidSliceIndex);
                }
            }
        }

        if var.is_none() && !history_available {
            if !is_single {
                // Unquoted expansion of a missing variable: the whole
                // in-progress argument expands to nothing.
                return Ok(());
            }

            // Quoted expansion: replace the marker, name, and slice with
            // the empty placeholder so chained markers still see that an
            // expansion happened here.
            let mut res: String = chars[..varexp_char_idx].iter().collect();
            if res.ends_with(VARIABLE_EXPAND_SINGLE) {
                res.push(VARIABLE_EXPAND_EMPTY);
            }
            res.extend(chars[var_name_and_slice_stop..].iter());
            return self.expand_variables(res, out, varexp_char_idx).await;
        }

        // Collect the (possibly sliced) value list.
        let mut var_item_list: Vec<String> = vec![];
        if all_values {
            if history_available {
                if let Some(handle) = &self.ctx.main_thread {
                    var_item_list = handle
                        .perform(|state| state.history.get_all())
                        .await
                        .unwrap_or_default();
                }
            } else if let Some(var) = &var {
                var_item_list = var.to_list();
            }
        } else if history_available {
            let indexes: Vec<usize> = var_idx_list
                .iter()
                .filter_map(|&n| usize::try_from(n).ok())
                .collect();
            if let Some(handle) = &self.ctx.main_thread {
                let query = indexes.clone();
                let item_map = handle
                    .perform(move |state| state.history.items_at_indexes(&query))
                    .await
                    .unwrap_or_default();
                for index in indexes {
                    if let Some(item) = item_map.get(&index) {
                        var_item_list.push(item.clone());
                    }
                }
            }
        } else if let Some(var) = &var {
            let all_var_items = var.to_list();
            for &item_index in &var_idx_list {
                // Out-of-bounds indexes are silently skipped; negative
                // ones were normalized at parse time, so anything below 1
                // is definitely out.
                if item_index >= 1 && (item_index as usize) <= all_var_items.len() {
                    var_item_list.push(all_var_items[item_index as usize - 1].clone());
                }
            }
        }

        if is_single {
            // Quoted expansion: join the values with spaces and recurse
            // once.
            let mut res: String = chars[..varexp_char_idx].iter().collect();
            if !res.is_empty() {
                if !res.ends_with(VARIABLE_EXPAND_SINGLE) {
                    res.push(INTERNAL_SEPARATOR);
                } else if var_item_list.first().map_or(true, |s| s.is_empty()) {
                    // First expansion is empty, but we need to recursively
                    // expand.
                    res.push(VARIABLE_EXPAND_EMPTY);
                }
            }
            res.push_str(&var_item_list.join(" "));
            res.extend(chars[var_name_and_slice_stop..].iter());
            return self.expand_variables(res, out, varexp_char_idx).await;
        }

        // Normal Cartesian-product expansion. The recursion handles the
        // markers to our left, so its results are gathered per element and
        // interleaved: combinations from earlier markers vary slowest,
        // this marker's elements fastest.
        let mut per_item: Vec<Vec<Completion>> = vec![];
        for item in &var_item_list {
            if varexp_char_idx == 0 && var_name_and_slice_stop == chars.len() {
                per_item.push(vec![Completion::from_completion(item.clone())]);
            } else {
                let mut new_in: String = chars[..varexp_char_idx].iter().collect();
                if !new_in.is_empty() {
                    if !new_in.ends_with(VARIABLE_EXPAND) {
                        new_in.push(INTERNAL_SEPARATOR);
                    } else if item.is_empty() {
                        new_in.push(VARIABLE_EXPAND_EMPTY);
                    }
                }
                new_in.push_str(item);
                new_in.extend(chars[var_name_and_slice_stop..].iter());

                let mut expanded = vec![];
                self.expand_variables(new_in, &mut expanded, varexp_char_idx)
                    .await?;
                per_item.push(expanded);
            }
        }

        let prefix_combinations = per_item.iter().map(Vec::len).max().unwrap_or(0);
        for i in 0..prefix_combinations {
            for row in &per_item {
                if let Some(comp) = row.get(i) {
                    out.push(comp.clone());
                }
            }
        }

        Ok(())
    }

    //
    // Stage 3: brace expansion.
    //

    fn stage_braces(
        &mut self,
        input: &str,
        out: &mut Vec<Completion>,
    ) -> Result<ExpandResult, error::Error> {
        self.expand_braces(input.to_owned(), out)?;
        Ok(ExpandResult::Ok)
    }

    fn expand_braces(
        &mut self,
        input: String,
        out: &mut Vec<Completion>,
    ) -> Result<(), error::Error> {
        let chars: Vec<char> = input.chars().collect();

        let mut syntax_error = false;
        let mut brace_count: i32 = 0;
        let mut brace_begin = None;
        let mut brace_end = None;

        // Locate the first non-nested brace pair.
        for (pos, &c) in chars.iter().enumerate() {
            if syntax_error {
                break;
            }

            match c {
                BRACE_BEGIN => {
                    if brace_count == 0 {
                        brace_begin = Some(pos);
                    }
                    brace_count += 1;
                }
                BRACE_END => {
                    brace_count -= 1;
                    if brace_count < 0 {
                        syntax_error = true;
                    } else if brace_count == 0 {
                        brace_end = Some(pos);
                    }
                }
                _ => {}
            }
        }

        if brace_count > 0 {
            if self.flags.contains(ExpandFlags::FOR_COMPLETIONS) {
                // The user hasn't typed the closing brace yet; make one up
                // and expand that.
                let mut synth = input.clone();
                synth.push(BRACE_END);
                return self.expand_braces(synth, out);
            }

            syntax_error = true;
        }

        // A literal "{}" passes through unchanged; tools like
        // `find -exec {}` depend on it.
        if let (Some(begin), Some(end)) = (brace_begin, brace_end) {
            if begin + 1 == end {
                let mut rewritten = chars.clone();
                rewritten[begin] = '{';
                rewritten[end] = '}';
                return self.expand_braces(rewritten.into_iter().collect(), out);
            }
        }

        if syntax_error {
            error::append_syntax_error(self.errors, SOURCE_LOCATION_UNKNOWN, "Mismatched braces");
            return Err(error::Error::MismatchedBraces);
        }

        let Some(brace_begin) = brace_begin else {
            out.push(Completion::from_completion(input));
            return Ok(());
        };
        let Some(brace_end) = brace_end else {
            out.push(Completion::from_completion(input));
            return Ok(());
        };

        // Emit prefix · alternative · suffix for each top-level
        // alternative, recursing to handle whatever remains.
        let mut brace_count: i32 = 0;
        let mut item_begin = brace_begin + 1;
        for pos in brace_begin + 1..=brace_end {
            let c = chars[pos];

            if brace_count == 0 && (c == BRACE_SEP || pos == brace_end) {
                let mut whole_item = String::with_capacity(chars.len());
                whole_item.extend(chars[..brace_begin].iter());
                whole_item.extend(chars[item_begin..pos].iter());
                whole_item.extend(chars[brace_end + 1..].iter());
                self.expand_braces(whole_item, out)?;

                item_begin = pos + 1;
                if pos == brace_end {
                    break;
                }
            }

            if c == BRACE_BEGIN {
                brace_count += 1;
            }
            if c == BRACE_END {
                brace_count -= 1;
            }
        }

        Ok(())
    }

    //
    // Stage 4: tilde and process expansion.
    //

    async fn stage_home_and_process(
        &mut self,
        input: &str,
        out: &mut Vec<Completion>,
    ) -> Result<ExpandResult, error::Error> {
        let mut next = input.to_owned();

        if self.flags.contains(ExpandFlags::SKIP_HOME_DIRECTORIES) {
            // Tilde handling is off; restore the literal character.
            if next.starts_with(HOME_DIRECTORY) {
                next.replace_range(0..HOME_DIRECTORY.len_utf8(), "~");
            }
        } else {
            expand_home_directory(&mut next, self.ctx.env);
        }

        if self.flags.contains(ExpandFlags::FOR_COMPLETIONS) {
            if next.starts_with(PROCESS_EXPAND) {
                self.expand_process(&next, out).await?;
                return Ok(ExpandResult::Ok);
            }
            out.push(Completion::from_completion(next));
        } else {
            self.expand_process(&next, out).await?;
        }

        Ok(ExpandResult::Ok)
    }

    async fn expand_process(
        &mut self,
        instr_with_sep: &str,
        out: &mut Vec<Completion>,
    ) -> Result<(), error::Error> {
        // If there's no separator and no process marker there's nothing to
        // do.
        if !instr_with_sep
            .chars()
            .any(|c| c == INTERNAL_SEPARATOR || c == PROCESS_EXPAND)
        {
            out.push(Completion::from_completion(instr_with_sep));
            return Ok(());
        }

        let mut instr = instr_with_sep.to_owned();
        remove_internal_separator(&mut instr, false);

        if !instr.starts_with(PROCESS_EXPAND) {
            out.push(Completion::from_completion(instr));
            return Ok(());
        }

        let body: String = instr.chars().skip(1).collect();
        let for_completions = self.flags.contains(ExpandFlags::FOR_COMPLETIONS);

        if for_completions {
            if SELF_STR.starts_with(&body) {
                out.push(self.described_completion(&SELF_STR[body.len()..], COMPLETE_SELF_DESC));
            } else if LAST_STR.starts_with(&body) {
                out.push(self.described_completion(&LAST_STR[body.len()..], COMPLETE_LAST_DESC));
            }
        } else {
            if body == SELF_STR {
                out.push(Completion::from_completion(self.ctx.shell_pid.to_string()));
                return Ok(());
            }
            if body == LAST_STR {
                if let Some(handle) = &self.ctx.main_thread {
                    let last = handle
                        .perform(|state| state.jobs.last_background_pgid)
                        .await
                        .flatten();
                    if let Some(pgid) = last {
                        out.push(Completion::from_completion(pgid.to_string()));
                    }
                }
                return Ok(());
            }
        }

        let prev_count = out.len();
        self.find_process(&body, out).await?;

        if out.len() == prev_count && !for_completions {
            // We failed to find anything.
            error::append_syntax_error(
                self.errors,
                1,
                format!("Could not expand process specifier '{body}'"),
            );
            return Err(error::Error::FailedProcessExpansion(body));
        }

        Ok(())
    }

    /// Search jobs (whole commands, then per-process command lines) and
    /// finally the user's own OS processes for something matching `body`.
    async fn find_process(
        &mut self,
        body: &str,
        out: &mut Vec<Completion>,
    ) -> Result<(), error::Error> {
        if !self.flags.contains(ExpandFlags::SKIP_JOBS) {
            if let Some(handle) = &self.ctx.main_thread {
                let body_for_jobs = body.to_owned();
                let flags = self.flags;
                let job_result = handle
                    .perform(move |state| find_job(&body_for_jobs, flags, &state.jobs))
                    .await;
                if let Some((found, mut completions)) = job_result {
                    out.append(&mut completions);
                    if found {
                        return Ok(());
                    }
                }
            }
        }

        for process in self.ctx.processes.list()? {
            if let Some(offset) = match_pid(&process.command, body) {
                if self.flags.contains(ExpandFlags::FOR_COMPLETIONS) {
                    let suffix = &process.command[offset + body.len()..];
                    out.push(self.described_completion(suffix, COMPLETE_PROCESS_DESC));
                } else {
                    out.push(Completion::from_completion(process.pid.to_string()));
                }
            }
        }

        Ok(())
    }

    fn described_completion(&self, text: &str, description: &str) -> Completion {
        described_completion(text, description, self.flags)
    }

    //
    // Stage 5: wildcard expansion.
    //

    fn stage_wildcards(
        &mut self,
        input: &str,
        out: &mut Vec<Completion>,
    ) -> Result<ExpandResult, error::Error> {
        let mut path_to_expand = input.to_owned();
        remove_internal_separator(
            &mut path_to_expand,
            self.flags.contains(ExpandFlags::SKIP_WILDCARDS),
        );

        if !patterns::wildcard_has(&path_to_expand) {
            out.push(Completion::from_completion(path_to_expand));
            return Ok(ExpandResult::Ok);
        }

        if self.flags.contains(ExpandFlags::EXECUTABLES_ONLY) {
            // Executable lookup dislikes wildcards; the candidate is
            // dropped rather than matched.
            return Ok(ExpandResult::Ok);
        }

        let working_dirs = self.effective_working_dirs(&path_to_expand);

        let mut result = ExpandResult::WildcardNoMatch;
        let mut expanded = vec![];
        for working_dir in working_dirs {
            match self
                .ctx
                .matcher
                .expand(&path_to_expand, &working_dir, self.flags, &mut expanded)
            {
                WildcardResult::Match => result = ExpandResult::WildcardMatch,
                WildcardResult::NoMatch => {}
                WildcardResult::Cancelled => {
                    error::append_wildcard_error(
                        self.errors,
                        SOURCE_LOCATION_UNKNOWN,
                        "Wildcard expansion was cancelled",
                    );
                    return Err(error::Error::Cancelled);
                }
            }
        }

        expanded.sort_by(|a, b| crate::completion::natural_compare(&a.completion, &b.completion));
        out.append(&mut expanded);

        Ok(result)
    }

    /// The set of directories a relative pattern is resolved against.
    fn effective_working_dirs(&self, path_to_expand: &str) -> Vec<PathBuf> {
        let working_dir = self.ctx.working_dir.clone();
        let for_cd = self.flags.contains(ExpandFlags::SPECIAL_FOR_CD);
        let for_command = self.flags.contains(ExpandFlags::SPECIAL_FOR_COMMAND);

        if !for_cd && !for_command {
            // Common case.
            return vec![working_dir];
        }

        // CDPATH resolves multi-level relative patterns; PATH is one level
        // only, so a slash anywhere pins command lookup to the current
        // directory. Explicitly anchored patterns never consult either.
        if path_to_expand.starts_with('/')
            || path_to_expand.starts_with("./")
            || path_to_expand.starts_with("../")
            || (for_command && path_to_expand.contains('/'))
        {
            return vec![working_dir];
        }

        let name = if for_cd { "CDPATH" } else { "PATH" };
        let paths = match self.ctx.env.get_unless_empty(name) {
            Some(value) => value.to_list(),
            None => {
                if for_cd {
                    vec![String::from(".")]
                } else {
                    vec![String::new()]
                }
            }
        };

        paths
            .iter()
            .map(|path| apply_working_directory(path, &working_dir))
            .collect()
    }

    //
    // Finalizer: tilde un-expansion.
    //

    /// If the original token began with a tilde, rewrite the expanded home
    /// prefix of token-replacing candidates back to `~…` so completions
    /// stay readable.
    fn unexpand_tildes(&self, input: &str, completions: &mut Vec<Completion>) {
        if !input.starts_with('~') {
            return;
        }

        if !completions.iter().any(Completion::replaces_token) {
            return;
        }

        let (username, _) = home_directory_name(input);
        let username_with_tilde = format!("~{username}");

        let mut home = username_with_tilde.clone();
        expand_tilde(&mut home, self.ctx.env);
        if home.is_empty() {
            return;
        }

        for comp in completions.iter_mut() {
            if comp.replaces_token() {
                if let Some(rest) = comp.completion.strip_prefix(home.as_str()) {
                    comp.completion = format!("{username_with_tilde}{rest}");

                    // The tilde is literal now; don't escape it.
                    comp.flags |= CompleteFlags::DONT_ESCAPE_TILDES;
                }
            }
        }
    }
}

enum CmdsubSearch {
    /// No command substitution present.
    None,
    /// The first non-nested balanced pair, as char indices.
    Parens { begin: usize, end: usize },
    /// A stray closer or an unterminated opener.
    Unbalanced,
}

/// Scan for the first non-nested command substitution, honoring backslash
/// escapes and single/double quoting in the raw input.
fn locate_cmdsubst(chars: &[char]) -> CmdsubSearch {
    let mut quote: Option<char> = None;
    let mut paren_begin = None;
    let mut depth = 0usize;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '\\' => {
                    i += 2;
                    continue;
                }
                '\'' | '"' => quote = Some(c),
                '(' => {
                    if depth == 0 {
                        paren_begin = Some(i);
                    }
                    depth += 1;
                }
                ')' => {
                    if depth == 0 {
                        return CmdsubSearch::Unbalanced;
                    }
                    depth -= 1;
                    if depth == 0 {
                        if let Some(begin) = paren_begin {
                            return CmdsubSearch::Parens { begin, end: i };
                        }
                    }
                }
                _ => {}
            }
        }

        i += 1;
    }

    if depth > 0 {
        CmdsubSearch::Unbalanced
    } else {
        CmdsubSearch::None
    }
}

/// Parse an array slice specification starting at the opening bracket.
/// Returns the 1-based indexes (negatives already normalized against
/// `array_size`) and the count of chars consumed, or the position of the
/// offending token.
fn parse_slice(input: &[char], array_size: usize) -> Result<(Vec<i64>, usize), usize> {
    let size = array_size as i64;
    let mut idx = vec![];
    let mut pos = 1; // skip past the opening square bracket

    loop {
        while pos < input.len() && (input[pos].is_whitespace() || input[pos] == INTERNAL_SEPARATOR)
        {
            pos += 1;
        }
        if pos >= input.len() {
            return Err(pos);
        }
        if input[pos] == ']' {
            pos += 1;
            break;
        }

        let (tmp, consumed) = parse_long(&input[pos..]).ok_or(pos)?;
        let mut i1 = if tmp > -1 { tmp } else { size + tmp + 1 };
        pos += consumed;

        while pos < input.len() && input[pos] == INTERNAL_SEPARATOR {
            pos += 1;
        }

        if pos + 1 < input.len() && input[pos] == '.' && input[pos + 1] == '.' {
            pos += 2;
            while pos < input.len() && input[pos] == INTERNAL_SEPARATOR {
                pos += 1;
            }

            let (tmp1, consumed) = parse_long(&input[pos..]).ok_or(pos)?;
            let mut i2 = if tmp1 > -1 { tmp1 } else { size + tmp1 + 1 };
            pos += consumed;

            // A range with both endpoints beyond the array contributes
            // nothing; otherwise each endpoint clamps to the size.
            if i1 > size && i2 > size {
                continue;
            }
            i1 = i1.min(size);
            i2 = i2.min(size);

            let direction: i64 = if i2 < i1 { -1 } else { 1 };
            let mut j = i1;
            while j * direction <= i2 * direction {
                idx.push(j);
                j += direction;
            }
            continue;
        }

        idx.push(i1);
    }

    Ok((idx, pos))
}

fn parse_long(input: &[char]) -> Option<(i64, usize)> {
    let mut pos = 0;
    let mut negative = false;
    if matches!(input.first(), Some(&('-' | '+'))) {
        negative = input[0] == '-';
        pos = 1;
    }

    let digits_start = pos;
    while pos < input.len() && input[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == digits_start {
        return None;
    }

    let digits: String = input[digits_start..pos].iter().collect();
    let mut value: i64 = digits.parse().ok()?;
    if negative {
        value = -value;
    }

    Some((value, pos))
}

/// Strip all internal separators; optionally also turn wildcard sentinels
/// back into their literal characters (for SKIP_WILDCARDS).
fn remove_internal_separator(s: &mut String, conv: bool) {
    s.retain(|c| c != INTERNAL_SEPARATOR);

    if conv {
        *s = s
            .chars()
            .map(|c| match c {
                ANY_CHAR => '?',
                ANY_STRING | ANY_STRING_RECURSIVE => '*',
                c => c,
            })
            .collect();
    }
}

/// Given a string starting with a tilde or its sentinel, return the user
/// name portion and the char index of the remainder (the slash, or
/// end-of-string).
fn home_directory_name(input: &str) -> (String, usize) {
    let chars: Vec<char> = input.chars().collect();
    debug_assert!(matches!(chars.first(), Some(&'~') | Some(&HOME_DIRECTORY)));

    let tail_idx = chars
        .iter()
        .position(|&c| c == '/')
        .unwrap_or(chars.len());
    (chars[1..tail_idx].iter().collect(), tail_idx)
}

/// Attempt tilde expansion of the string, in place. On resolution failure
/// the sentinel reverts to a literal tilde and the string is otherwise
/// untouched.
pub(crate) fn expand_home_directory(input: &mut String, env: &crate::env::ShellEnvironment) {
    if !input.starts_with(HOME_DIRECTORY) {
        return;
    }

    let (username, tail_idx) = home_directory_name(input);

    let home: Option<PathBuf>;
    if username.is_empty() {
        // The invoking user's home.
        match env.get_unless_empty("HOME") {
            Some(value) => home = Some(PathBuf::from(value.as_string())),
            None => {
                input.clear();
                return;
            }
        }
    } else {
        home = users::home_dir_for_user(&username);
    }

    let realhome = home.and_then(|home| std::fs::canonicalize(home).ok());

    match realhome {
        Some(realhome) => {
            let tail: String = input.chars().skip(tail_idx).collect();
            *input = format!("{}{}", realhome.to_string_lossy(), tail);
        }
        None => {
            let tail: String = input.chars().skip(1).collect();
            *input = format!("~{tail}");
        }
    }
}

/// Search the job table for something matching `proc_str`: the last
/// backgrounded job for an empty specifier, a job id for a numeric one, a
/// command-line prefix otherwise. Returns whether the search is concluded
/// (the process scan should be skipped) along with any candidates. Runs on
/// the main thread.
fn find_job(proc_str: &str, flags: ExpandFlags, jobs: &JobManager) -> (bool, Vec<Completion>) {
    let for_completions = flags.contains(ExpandFlags::FOR_COMPLETIONS);
    let mut out = vec![];
    let mut found = false;

    if proc_str.is_empty() && !for_completions {
        // A bare '%' expands to the last job backgrounded. Don't try the
        // other match methods for it; killing the wrong thing is too easy.
        if let Some(job) = jobs.most_recent() {
            out.push(Completion::from_completion(job.pgid.to_string()));
        }
        found = true;
    } else if proc_str.chars().all(|c| c.is_ascii_digit()) {
        // A numeric specifier is a job id; stop here so a stray number
        // can't match a random process name.
        if for_completions {
            for job in jobs.iter() {
                if job.command_is_empty() {
                    continue;
                }
                let jid = job.id.to_string();
                if jid.starts_with(proc_str) {
                    out.push(described_completion(
                        &jid[proc_str.len()..],
                        &format!("Job: {}", job.command_line),
                        flags,
                    ));
                }
            }
        } else if let Ok(jid) = proc_str.parse::<usize>() {
            if jid > 0 {
                if let Some(job) = jobs.job_get(jid) {
                    if !job.command_is_empty() {
                        out.push(Completion::from_completion(job.pgid.to_string()));
                    }
                }
            }
        }
        found = true;
    }

    if found {
        return (true, out);
    }

    for job in jobs.iter() {
        if job.command_is_empty() {
            continue;
        }
        if let Some(offset) = match_pid(&job.command_line, proc_str) {
            if for_completions {
                let suffix = &job.command_line[offset + proc_str.len()..];
                out.push(described_completion(suffix, COMPLETE_JOB_DESC, flags));
            } else {
                out.push(Completion::from_completion(job.pgid.to_string()));
                found = true;
            }
        }
    }

    if found {
        return (true, out);
    }

    for job in jobs.iter() {
        if job.command_is_empty() {
            continue;
        }
        for process in &job.processes {
            if process.command.is_empty() {
                continue;
            }
            if let Some(offset) = match_pid(&process.command, proc_str) {
                if for_completions {
                    let suffix = &process.command[offset + proc_str.len()..];
                    out.push(described_completion(
                        suffix,
                        COMPLETE_CHILD_PROCESS_DESC,
                        flags,
                    ));
                } else {
                    out.push(Completion::from_completion(process.pid.to_string()));
                    found = true;
                }
            }
        }
    }

    (found, out)
}

/// If `proc_str` prefixes the command line (or its basename), return the
/// byte offset where the match begins. An empty specifier matches every
/// command at its basename, so completing against a bare `%` doesn't show
/// a pile of paths.
fn match_pid(cmd: &str, proc_str: &str) -> Option<usize> {
    if !proc_str.is_empty() && cmd.starts_with(proc_str) {
        return Some(0);
    }

    let base = cmd.rsplit('/').next().unwrap_or(cmd);
    base.starts_with(proc_str).then(|| cmd.len() - base.len())
}

fn described_completion(text: &str, description: &str, flags: ExpandFlags) -> Completion {
    if flags.contains(ExpandFlags::NO_DESCRIPTIONS) {
        Completion::from_completion(text)
    } else {
        Completion::with_description(text, description)
    }
}

/// Resolve one search-path entry against the working directory. An empty
/// entry means the working directory itself.
fn apply_working_directory(path: &str, working_dir: &Path) -> PathBuf {
    if path.is_empty() {
        working_dir.to_path_buf()
    } else if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        working_dir.join(path)
    }
}

fn escape_single_quoted(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('\'');
    for c in s.chars() {
        // Escape backslashes and single quotes only.
        if c == '\\' || c == '\'' {
            result.push('\\');
        }
        result.push(c);
    }
    result.push('\'');
    result
}

/// Compatibility shim for xdm-style login scripts that run
/// `exec "${@}"`: rewrite that single command into `exec` followed by the
/// shell's own arguments, single-quote-escaped.
pub fn fish_xdm_login_hack(cmds: &mut Vec<String>, argv: &[String]) -> bool {
    if cmds.len() != 1 {
        return false;
    }

    let cmd = &cmds[0];
    if cmd == "exec \"${@}\"" || cmd == "exec \"$@\"" {
        let mut new_cmd = String::from("exec");
        for arg in argv.iter().skip(1) {
            new_cmd.push(' ');
            new_cmd.push_str(&escape_single_quoted(arg));
        }

        cmds[0] = new_cmd;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_fs::prelude::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::context::{SubshellExecutor, SubshellOutput};
    use crate::env::ShellEnvironment;
    use crate::error::ParseErrorKind;
    use crate::escape::EXPAND_SENTINELS;
    use crate::jobs::{Job, JobProcess};
    use crate::mainthread::{MainThreadService, MainThreadState};
    use crate::patterns::FsWildcardMatcher;
    use crate::procs::NullProcessSource;

    struct NoSubshell;

    #[async_trait]
    impl SubshellExecutor for NoSubshell {
        async fn exec_subshell(&self, _source: &str) -> Result<SubshellOutput, error::Error> {
            Err(error::Error::CmdSubstitutionFailed)
        }
    }

    struct ScriptedSubshell {
        lines: Vec<String>,
        truncated: bool,
    }

    impl ScriptedSubshell {
        fn with_lines(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| (*s).to_owned()).collect(),
                truncated: false,
            }
        }
    }

    #[async_trait]
    impl SubshellExecutor for ScriptedSubshell {
        async fn exec_subshell(&self, _source: &str) -> Result<SubshellOutput, error::Error> {
            Ok(SubshellOutput {
                lines: self.lines.clone(),
                truncated: self.truncated,
            })
        }
    }

    type Expansion = (
        Result<ExpandResult, error::Error>,
        Vec<Completion>,
        ParseErrorList,
    );

    async fn expand_full(
        env: &ShellEnvironment,
        executor: &dyn SubshellExecutor,
        working_dir: Option<&Path>,
        input: &str,
        flags: ExpandFlags,
    ) -> Expansion {
        let matcher = FsWildcardMatcher::new();
        let processes = NullProcessSource;
        let mut ctx = ExpandContext::new(env, executor, &matcher, &processes);
        if let Some(working_dir) = working_dir {
            ctx = ctx.with_working_dir(working_dir);
        }

        let mut out = vec![];
        let mut errors = ParseErrorList::new();
        let result = expand_string(input, &mut out, flags, &ctx, &mut errors).await;
        (result, out, errors)
    }

    async fn expand_to_strings(env: &ShellEnvironment, input: &str) -> Vec<String> {
        let (result, out, errors) =
            expand_full(env, &NoSubshell, None, input, ExpandFlags::empty()).await;
        assert!(
            result.is_ok(),
            "expansion of {input:?} failed: {result:?}; errors: {errors:?}",
        );
        to_strings(out)
    }

    async fn expand_with_main_thread(
        env: &ShellEnvironment,
        state: MainThreadState,
        input: &str,
        flags: ExpandFlags,
    ) -> Expansion {
        let (service, handle) = MainThreadService::new(state);

        let run = async move {
            let executor = NoSubshell;
            let matcher = FsWildcardMatcher::new();
            let processes = NullProcessSource;
            let ctx = ExpandContext::new(env, &executor, &matcher, &processes)
                .with_main_thread(handle);

            let mut out = vec![];
            let mut errors = ParseErrorList::new();
            let result = expand_string(input, &mut out, flags, &ctx, &mut errors).await;
            (result, out, errors)
        };

        let (outputs, _state) = tokio::join!(run, service.serve());
        outputs
    }

    fn to_strings(out: Vec<Completion>) -> Vec<String> {
        out.into_iter().map(|c| c.completion).collect()
    }

    fn env_with_lists(pairs: &[(&str, &[&str])]) -> ShellEnvironment {
        let mut env = ShellEnvironment::new();
        for (name, values) in pairs {
            env.set(*name, *values);
        }
        env
    }

    #[tokio::test]
    async fn test_clean_input_fast_path() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(expand_to_strings(&env, "plain").await, vec!["plain"]);
        assert_eq!(expand_to_strings(&env, "a~b%c").await, vec!["a~b%c"]);
        assert_eq!(expand_to_strings(&env, "a[1]").await, vec!["a[1]"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_single_variable() -> Result<()> {
        let env = env_with_lists(&[("a", &["1", "2"])]);

        assert_eq!(expand_to_strings(&env, "$a").await, vec!["1", "2"]);
        assert_eq!(expand_to_strings(&env, "x$a").await, vec!["x1", "x2"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cartesian_product_order() -> Result<()> {
        let env = env_with_lists(&[("a", &["1", "2"]), ("b", &["x", "y"])]);

        assert_eq!(
            expand_to_strings(&env, "$a$b").await,
            vec!["1x", "1y", "2x", "2y"],
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_quoted_join() -> Result<()> {
        let env = env_with_lists(&[("a", &["1", "2", "3"])]);

        assert_eq!(
            expand_to_strings(&env, "\"pre $a post\"").await,
            vec!["pre 1 2 3 post"],
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_variable_expands_to_nothing() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(expand_to_strings(&env, "$missing").await, Vec::<String>::new());
        assert_eq!(expand_to_strings(&env, "a$missing").await, Vec::<String>::new());
        assert_eq!(
            expand_to_strings(&env, "$missing[1]").await,
            Vec::<String>::new(),
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_quoted_missing_variable_is_empty_string() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(expand_to_strings(&env, "\"$missing\"").await, vec![""]);
        Ok(())
    }

    #[tokio::test]
    async fn test_chained_dollar_through_unset() -> Result<()> {
        let env = env_with_lists(&[("name", &["X"])]);

        assert_eq!(expand_to_strings(&env, "$$name").await, Vec::<String>::new());
        Ok(())
    }

    #[tokio::test]
    async fn test_chained_dollar_resolves() -> Result<()> {
        let env = env_with_lists(&[("name", &["inner"]), ("inner", &["v1", "v2"])]);

        assert_eq!(expand_to_strings(&env, "$$name").await, vec!["v1", "v2"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_variable_value() -> Result<()> {
        let env = env_with_lists(&[("a", &[""])]);

        assert_eq!(expand_to_strings(&env, "$a").await, vec![""]);
        assert_eq!(expand_to_strings(&env, "x$a").await, vec!["x"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_slices() -> Result<()> {
        let env = env_with_lists(&[("a", &["x", "y", "z"])]);

        assert_eq!(expand_to_strings(&env, "$a[1]").await, vec!["x"]);
        assert_eq!(expand_to_strings(&env, "$a[-1]").await, vec!["z"]);
        assert_eq!(expand_to_strings(&env, "$a[-2..-1]").await, vec!["y", "z"]);
        assert_eq!(expand_to_strings(&env, "$a[2..1]").await, vec!["y", "x"]);
        assert_eq!(expand_to_strings(&env, "$a[1 3]").await, vec!["x", "z"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_slice_out_of_range() -> Result<()> {
        let env = env_with_lists(&[("a", &["x", "y"])]);

        assert_eq!(expand_to_strings(&env, "$a[5]").await, Vec::<String>::new());
        assert_eq!(expand_to_strings(&env, "$a[5..6]").await, Vec::<String>::new());
        assert_eq!(expand_to_strings(&env, "$a[1..9]").await, vec!["x", "y"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_slice_index_is_syntax_error() -> Result<()> {
        let env = env_with_lists(&[("a", &["x"])]);

        let (result, _, errors) =
            expand_full(&env, &NoSubshell, None, "$a[bogus]", ExpandFlags::empty()).await;
        assert!(matches!(result, Err(error::Error::InvalidSliceIndex)));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::Syntax);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_variable_name_is_error() -> Result<()> {
        let env = ShellEnvironment::new();

        let (result, _, errors) =
            expand_full(&env, &NoSubshell, None, "$ ", ExpandFlags::empty()).await;
        assert!(matches!(result, Err(error::Error::MissingVariableName)));
        assert_eq!(errors.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_skip_variables_leaves_dollar_literal() -> Result<()> {
        let env = env_with_lists(&[("a", &["1"])]);

        let (result, out, _) =
            expand_full(&env, &NoSubshell, None, "$a", ExpandFlags::SKIP_VARIABLES).await;
        assert!(result.is_ok());
        assert_eq!(to_strings(out), vec!["$a"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_braces() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(expand_to_strings(&env, "a{b,c}d").await, vec!["abd", "acd"]);
        assert_eq!(
            expand_to_strings(&env, "{a,b}{c,d}").await,
            vec!["ac", "ad", "bc", "bd"],
        );
        assert_eq!(
            expand_to_strings(&env, "{a,b{c,d}}").await,
            vec!["a", "bc", "bd"],
        );
        assert_eq!(expand_to_strings(&env, "a{}b").await, vec!["a{}b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unterminated_brace() -> Result<()> {
        let env = ShellEnvironment::new();

        // Completion mode repairs the input; execution mode reports it.
        let (result, out, _) = expand_full(
            &env,
            &NoSubshell,
            None,
            "a{b,c",
            ExpandFlags::FOR_COMPLETIONS,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(to_strings(out), vec!["ab", "ac"]);

        let (result, _, errors) =
            expand_full(&env, &NoSubshell, None, "a{b,c", ExpandFlags::empty()).await;
        assert!(matches!(result, Err(error::Error::MismatchedBraces)));
        assert_eq!(errors[0].kind, ParseErrorKind::Syntax);
        Ok(())
    }

    #[tokio::test]
    async fn test_stray_closing_brace_is_error() -> Result<()> {
        let env = ShellEnvironment::new();

        let (result, _, _) =
            expand_full(&env, &NoSubshell, None, "a}b", ExpandFlags::empty()).await;
        assert!(matches!(result, Err(error::Error::MismatchedBraces)));
        Ok(())
    }

    #[tokio::test]
    async fn test_command_substitution_product() -> Result<()> {
        let env = ShellEnvironment::new();
        let executor = ScriptedSubshell::with_lines(&["one", "two"]);

        let (result, out, _) =
            expand_full(&env, &executor, None, "pre(ls)suf", ExpandFlags::empty()).await;
        assert!(result.is_ok());
        assert_eq!(to_strings(out), vec!["preonesuf", "pretwosuf"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_command_substitution_slice() -> Result<()> {
        let env = ShellEnvironment::new();
        let executor = ScriptedSubshell::with_lines(&["one", "two"]);

        let (_, out, _) = expand_full(&env, &executor, None, "(ls)[2]", ExpandFlags::empty()).await;
        assert_eq!(to_strings(out), vec!["two"]);

        let (_, out, _) =
            expand_full(&env, &executor, None, "(ls)[2..1]", ExpandFlags::empty()).await;
        assert_eq!(to_strings(out), vec!["two", "one"]);

        let (_, out, _) = expand_full(&env, &executor, None, "(ls)[5]", ExpandFlags::empty()).await;
        assert_eq!(to_strings(out), Vec::<String>::new());
        Ok(())
    }

    #[tokio::test]
    async fn test_command_substitution_output_stays_one_argument() -> Result<()> {
        let env = ShellEnvironment::new();
        let executor = ScriptedSubshell::with_lines(&["a b", "{c,d}*"]);

        let (_, out, _) = expand_full(&env, &executor, None, "(x)", ExpandFlags::empty()).await;
        assert_eq!(to_strings(out), vec!["a b", "{c,d}*"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_command_substitution_failure() -> Result<()> {
        let env = ShellEnvironment::new();

        let (result, _, errors) =
            expand_full(&env, &NoSubshell, None, "(boom)", ExpandFlags::empty()).await;
        assert!(matches!(result, Err(error::Error::CmdSubstitutionFailed)));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::CommandSubstitution);
        Ok(())
    }

    #[tokio::test]
    async fn test_command_substitution_truncation() -> Result<()> {
        let env = ShellEnvironment::new();
        let executor = ScriptedSubshell {
            lines: vec!["partial".to_owned()],
            truncated: true,
        };

        let (result, _, errors) =
            expand_full(&env, &executor, None, "(yes)", ExpandFlags::empty()).await;
        assert!(matches!(result, Err(error::Error::CmdSubstitutionOverflow)));
        assert!(errors[0].text.contains("Too much data"));
        Ok(())
    }

    #[tokio::test]
    async fn test_mismatched_parenthesis() -> Result<()> {
        let env = ShellEnvironment::new();

        for input in ["foo(bar", "foo)bar"] {
            let (result, _, errors) =
                expand_full(&env, &NoSubshell, None, input, ExpandFlags::empty()).await;
            assert!(
                matches!(result, Err(error::Error::MismatchedParenthesis)),
                "input {input:?}",
            );
            assert_eq!(errors[0].text, "Mismatched parenthesis");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_quoted_parens_are_not_substitutions() -> Result<()> {
        let env = ShellEnvironment::new();

        // The executor would fail if it were ever consulted.
        let (result, out, _) =
            expand_full(&env, &NoSubshell, None, "'(ls)'", ExpandFlags::empty()).await;
        assert!(result.is_ok());
        assert_eq!(to_strings(out), vec!["(ls)"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_skip_cmdsubst_fails_on_parens() -> Result<()> {
        let env = ShellEnvironment::new();

        let (result, _, errors) =
            expand_full(&env, &NoSubshell, None, "(ls)", ExpandFlags::SKIP_CMDSUBST).await;
        assert!(matches!(result, Err(error::Error::CmdSubstitutionNotAllowed)));
        assert_eq!(errors[0].text, "Command substitutions not allowed");
        Ok(())
    }

    #[tokio::test]
    async fn test_tilde_expansion() -> Result<()> {
        let home = assert_fs::TempDir::new()?;
        home.child("notes.txt").touch()?;
        let real_home = home.path().canonicalize()?;

        let mut env = ShellEnvironment::new();
        env.set("HOME", real_home.to_string_lossy().to_string());

        assert_eq!(
            expand_to_strings(&env, "~").await,
            vec![real_home.to_string_lossy().to_string()],
        );
        assert_eq!(
            expand_to_strings(&env, "~/notes.txt").await,
            vec![format!("{}/notes.txt", real_home.to_string_lossy())],
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_tilde_unknown_user_is_untouched() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(
            expand_to_strings(&env, "~nosuchuserhere/x").await,
            vec!["~nosuchuserhere/x"],
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_tilde_with_home_unset_clears_word() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(expand_to_strings(&env, "~").await, vec![""]);
        Ok(())
    }

    #[tokio::test]
    async fn test_skip_home_directories_leaves_tilde() -> Result<()> {
        let mut env = ShellEnvironment::new();
        env.set("HOME", "/somewhere");

        let (result, out, _) = expand_full(
            &env,
            &NoSubshell,
            None,
            "~/x",
            ExpandFlags::SKIP_HOME_DIRECTORIES,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(to_strings(out), vec!["~/x"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_self() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(
            expand_to_strings(&env, "%self").await,
            vec![std::process::id().to_string()],
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_last_without_background_job() -> Result<()> {
        let env = ShellEnvironment::new();

        let (result, out, _) = expand_with_main_thread(
            &env,
            MainThreadState::default(),
            "%last",
            ExpandFlags::empty(),
        )
        .await;
        assert!(result.is_ok());
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_last_with_background_job() -> Result<()> {
        let env = ShellEnvironment::new();
        let mut state = MainThreadState::default();
        state.jobs.last_background_pgid = Some(777);

        let (_, out, _) =
            expand_with_main_thread(&env, state, "%last", ExpandFlags::empty()).await;
        assert_eq!(to_strings(out), vec!["777"]);
        Ok(())
    }

    fn state_with_sleep_job() -> MainThreadState {
        let mut state = MainThreadState::default();
        state.jobs.add(Job::new(
            4242,
            "sleep 99 &",
            vec![JobProcess {
                pid: 4243,
                command: "/bin/sleep".to_owned(),
            }],
        ));
        state
    }

    #[tokio::test]
    async fn test_percent_job_id() -> Result<()> {
        let env = ShellEnvironment::new();

        let (_, out, _) = expand_with_main_thread(
            &env,
            state_with_sleep_job(),
            "%1",
            ExpandFlags::empty(),
        )
        .await;
        assert_eq!(to_strings(out), vec!["4242"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_unknown_job_id_is_error() -> Result<()> {
        let env = ShellEnvironment::new();

        let (result, _, errors) = expand_with_main_thread(
            &env,
            state_with_sleep_job(),
            "%7",
            ExpandFlags::empty(),
        )
        .await;
        assert!(matches!(
            result,
            Err(error::Error::FailedProcessExpansion(_)),
        ));
        assert!(errors[0].text.contains("process"));
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_job_command_prefix() -> Result<()> {
        let env = ShellEnvironment::new();

        let (_, out, _) = expand_with_main_thread(
            &env,
            state_with_sleep_job(),
            "%sle",
            ExpandFlags::empty(),
        )
        .await;
        assert_eq!(to_strings(out), vec!["4242"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_child_process_match() -> Result<()> {
        let env = ShellEnvironment::new();

        // No job command starts with "/bin/sl", but a child process does.
        let (_, out, _) = expand_with_main_thread(
            &env,
            state_with_sleep_job(),
            "%/bin/sl",
            ExpandFlags::empty(),
        )
        .await;
        assert_eq!(to_strings(out), vec!["4243"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_completions() -> Result<()> {
        let env = ShellEnvironment::new();

        let (_, out, _) = expand_with_main_thread(
            &env,
            state_with_sleep_job(),
            "%",
            ExpandFlags::FOR_COMPLETIONS,
        )
        .await;

        let strings: Vec<String> = out.iter().map(|c| c.completion.clone()).collect();
        assert_eq!(strings, vec!["self", "1"]);
        assert_eq!(out[0].description.as_deref(), Some("Shell process"));
        assert_eq!(out[1].description.as_deref(), Some("Job: sleep 99 &"));
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_self_completion_suffix() -> Result<()> {
        let env = ShellEnvironment::new();

        let (_, out, _) = expand_with_main_thread(
            &env,
            MainThreadState::default(),
            "%se",
            ExpandFlags::FOR_COMPLETIONS,
        )
        .await;
        assert_eq!(to_strings(out), vec!["lf"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_percent_completions_without_descriptions() -> Result<()> {
        let env = ShellEnvironment::new();

        let (_, out, _) = expand_with_main_thread(
            &env,
            MainThreadState::default(),
            "%se",
            ExpandFlags::FOR_COMPLETIONS | ExpandFlags::NO_DESCRIPTIONS,
        )
        .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].description, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_history_variable() -> Result<()> {
        let env = ShellEnvironment::new();
        let mut state = MainThreadState::default();
        state.history.add("echo older");
        state.history.add("echo newer");

        let (_, out, _) =
            expand_with_main_thread(&env, state, "$history[1]", ExpandFlags::empty()).await;
        assert_eq!(to_strings(out), vec!["echo newer"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_history_without_main_thread_is_missing() -> Result<()> {
        let env = ShellEnvironment::new();

        assert_eq!(expand_to_strings(&env, "$history").await, Vec::<String>::new());
        assert_eq!(
            expand_to_strings(&env, "$history[1]").await,
            Vec::<String>::new(),
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_wildcards_match_and_sort_naturally() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("file10").touch()?;
        dir.child("file9").touch()?;
        dir.child("File1").touch()?;

        let env = ShellEnvironment::new();
        let (result, out, _) = expand_full(
            &env,
            &NoSubshell,
            Some(dir.path()),
            "file*",
            ExpandFlags::empty(),
        )
        .await;

        assert!(matches!(result, Ok(ExpandResult::WildcardMatch)));
        // Matching is case-sensitive, so File1 is excluded; ordering is
        // numerically aware.
        assert_eq!(to_strings(out), vec!["file9", "file10"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_wildcard_no_match() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;

        let env = ShellEnvironment::new();
        let (result, out, _) = expand_full(
            &env,
            &NoSubshell,
            Some(dir.path()),
            "nope*",
            ExpandFlags::empty(),
        )
        .await;

        assert!(matches!(result, Ok(ExpandResult::WildcardNoMatch)));
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_skip_wildcards_makes_them_literal() -> Result<()> {
        let env = ShellEnvironment::new();

        let (result, out, _) = expand_full(
            &env,
            &NoSubshell,
            None,
            "a*b?c**",
            ExpandFlags::SKIP_WILDCARDS,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(to_strings(out), vec!["a*b?c*"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_executables_only_disables_wildcards() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("match").touch()?;

        let env = ShellEnvironment::new();
        let (result, out, _) = expand_full(
            &env,
            &NoSubshell,
            Some(dir.path()),
            "mat*",
            ExpandFlags::EXECUTABLES_ONLY,
        )
        .await;
        assert!(matches!(result, Ok(ExpandResult::Ok)));
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_cdpath_working_dirs() -> Result<()> {
        let cwd = assert_fs::TempDir::new()?;
        let elsewhere = assert_fs::TempDir::new()?;
        elsewhere.child("project/.keep").touch()?;

        let mut env = ShellEnvironment::new();
        env.set("CDPATH", elsewhere.path().to_string_lossy().to_string());

        let (result, out, _) = expand_full(
            &env,
            &NoSubshell,
            Some(cwd.path()),
            "proj*",
            ExpandFlags::SPECIAL_FOR_CD,
        )
        .await;
        assert!(matches!(result, Ok(ExpandResult::WildcardMatch)));
        assert_eq!(to_strings(out), vec!["project"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cdpath_empty_entry_is_current_dir() -> Result<()> {
        let cwd = assert_fs::TempDir::new()?;
        cwd.child("proj_local/.keep").touch()?;
        let elsewhere = assert_fs::TempDir::new()?;
        elsewhere.child("proj_far/.keep").touch()?;

        let mut env = ShellEnvironment::new();
        env.set(
            "CDPATH",
            format!(":{}", elsewhere.path().to_string_lossy()),
        );

        let (_, out, _) = expand_full(
            &env,
            &NoSubshell,
            Some(cwd.path()),
            "proj*",
            ExpandFlags::SPECIAL_FOR_CD,
        )
        .await;
        let mut names = to_strings(out);
        names.sort();
        assert_eq!(names, vec!["proj_far", "proj_local"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_for_command_with_slash_uses_working_dir_only() -> Result<()> {
        let cwd = assert_fs::TempDir::new()?;
        cwd.child("bin/tool").touch()?;
        let path_dir = assert_fs::TempDir::new()?;
        path_dir.child("bin/other").touch()?;

        let mut env = ShellEnvironment::new();
        env.set("PATH", path_dir.path().to_string_lossy().to_string());

        let (_, out, _) = expand_full(
            &env,
            &NoSubshell,
            Some(cwd.path()),
            "bin/t*",
            ExpandFlags::SPECIAL_FOR_COMMAND,
        )
        .await;
        assert_eq!(to_strings(out), vec!["bin/tool"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unexpand_tildes_for_completions() -> Result<()> {
        let home = assert_fs::TempDir::new()?;
        home.child("notes.txt").touch()?;
        let real_home = home.path().canonicalize()?;

        let mut env = ShellEnvironment::new();
        env.set("HOME", real_home.to_string_lossy().to_string());

        let (_, out, _) = expand_full(
            &env,
            &NoSubshell,
            None,
            "~/no*",
            ExpandFlags::FOR_COMPLETIONS,
        )
        .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].completion, "~/notes.txt");
        assert!(out[0].flags.contains(CompleteFlags::DONT_ESCAPE_TILDES));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancellation() -> Result<()> {
        let env = ShellEnvironment::new();
        let executor = NoSubshell;
        let matcher = FsWildcardMatcher::new();
        let processes = NullProcessSource;

        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let ctx = ExpandContext::new(&env, &executor, &matcher, &processes)
            .with_cancellation(token);

        let mut out = vec![];
        let mut errors = ParseErrorList::new();
        let result = expand_string("$a", &mut out, ExpandFlags::empty(), &ctx, &mut errors).await;
        assert!(matches!(result, Err(error::Error::Cancelled)));
        Ok(())
    }

    #[tokio::test]
    async fn test_expand_one() -> Result<()> {
        let env = env_with_lists(&[("multi", &["1", "2"]), ("solo", &["only"])]);
        let executor = NoSubshell;
        let matcher = FsWildcardMatcher::new();
        let processes = NullProcessSource;
        let ctx = ExpandContext::new(&env, &executor, &matcher, &processes);
        let mut errors = ParseErrorList::new();

        let mut word = String::from("clean");
        assert!(expand_one(&mut word, ExpandFlags::empty(), &ctx, &mut errors).await);
        assert_eq!(word, "clean");

        let mut word = String::from("$solo");
        assert!(expand_one(&mut word, ExpandFlags::empty(), &ctx, &mut errors).await);
        assert_eq!(word, "only");

        let mut word = String::from("$multi");
        assert!(!expand_one(&mut word, ExpandFlags::empty(), &ctx, &mut errors).await);
        assert_eq!(word, "$multi");
        Ok(())
    }

    #[tokio::test]
    async fn test_no_sentinels_leak() -> Result<()> {
        let env = env_with_lists(&[("a", &["1", "2"]), ("empty", &[""])]);
        let executor = ScriptedSubshell::with_lines(&["out1", "out2"]);

        for input in [
            "$a", "x$a$a", "\"$a\"", "{p,q}$a", "(c)$a", "~", "%self", "$empty",
            "a{b,c}d", "'*?'", "\\*",
        ] {
            for flags in [
                ExpandFlags::empty(),
                ExpandFlags::FOR_COMPLETIONS,
                ExpandFlags::SKIP_VARIABLES,
                ExpandFlags::SKIP_WILDCARDS,
            ] {
                let (_, out, _) = expand_full(&env, &executor, None, input, flags).await;
                for comp in &out {
                    for c in comp.completion.chars() {
                        assert!(
                            !EXPAND_SENTINELS.contains(&c),
                            "sentinel {c:?} leaked from {input:?} with {flags:?}: {comp:?}",
                        );
                    }
                }
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_expand_tilde_in_place() -> Result<()> {
        let home = assert_fs::TempDir::new()?;
        let real_home = home.path().canonicalize()?;

        let mut env = ShellEnvironment::new();
        env.set("HOME", real_home.to_string_lossy().to_string());

        let mut word = String::from("~/sub");
        expand_tilde(&mut word, &env);
        assert_eq!(word, format!("{}/sub", real_home.to_string_lossy()));

        let mut word = String::from("no-tilde");
        expand_tilde(&mut word, &env);
        assert_eq!(word, "no-tilde");
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_home_directory_with_tilde() -> Result<()> {
        let home = assert_fs::TempDir::new()?;
        let real_home = home.path().canonicalize()?;

        let mut env = ShellEnvironment::new();
        env.set("HOME", real_home.to_string_lossy().to_string());

        let inside = format!("{}/docs", real_home.to_string_lossy());
        assert_eq!(replace_home_directory_with_tilde(&inside, &env), "~/docs");
        assert_eq!(
            replace_home_directory_with_tilde("/etc/passwd", &env),
            "/etc/passwd",
        );
        assert_eq!(replace_home_directory_with_tilde("rel/path", &env), "rel/path");
        Ok(())
    }

    #[test]
    fn test_fish_xdm_login_hack() {
        let argv: Vec<String> = ["fish", "a b", "it's"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();

        for cmd in ["exec \"${@}\"", "exec \"$@\""] {
            let mut cmds = vec![cmd.to_owned()];
            assert!(fish_xdm_login_hack(&mut cmds, &argv));
            assert_eq!(cmds, vec!["exec 'a b' 'it\\'s'"]);
        }

        let mut cmds = vec!["echo hi".to_owned()];
        assert!(!fish_xdm_login_hack(&mut cmds, &argv));
        assert_eq!(cmds, vec!["echo hi"]);

        let mut cmds = vec!["exec \"$@\"".to_owned(), "other".to_owned()];
        assert!(!fish_xdm_login_hack(&mut cmds, &argv));
    }

    #[test]
    fn test_parse_slice_directly() {
        let chars: Vec<char> = "[2..-1]".chars().collect();
        let (indexes, consumed) = parse_slice(&chars, 4).unwrap();
        assert_eq!(indexes, vec![2, 3, 4]);
        assert_eq!(consumed, chars.len());

        let chars: Vec<char> = "[x]".chars().collect();
        assert!(parse_slice(&chars, 4).is_err());

        let chars: Vec<char> = "[1".chars().collect();
        assert!(parse_slice(&chars, 4).is_err());
    }

    #[test]
    fn test_match_pid() {
        assert_eq!(match_pid("/usr/bin/vim", "/usr/bin/v"), Some(0));
        assert_eq!(match_pid("/usr/bin/vim", "vi"), Some("/usr/bin/".len()));
        assert_eq!(match_pid("/usr/bin/vim", "emacs"), None);
        assert_eq!(match_pid("/usr/bin/vim", ""), Some("/usr/bin/".len()));
    }
}
