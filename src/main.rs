use clap::Parser;
use vigil::{
   Result, RuleSet, VigilError, git, github, output, parse_diff,
   runner::{self, ProcessContext},
   style, testing,
   types::{Args, RunOutput},
   validate,
};

fn main() {
   let args = Args::parse();
   match execute(&args) {
      Ok(code) => std::process::exit(code),
      Err(e) => {
         eprintln!("{}", style::error(&e.to_string()));
         std::process::exit(1);
      },
   }
}

fn execute(args: &Args) -> Result<i32> {
   if args.test {
      return run_test_mode(args);
   }

   let config_path = args
      .config
      .as_ref()
      .ok_or_else(|| VigilError::ConfigError("--config is required".to_string()))?;
   let rules = RuleSet::from_file(config_path)?;

   if args.check {
      return Ok(check_ruleset(&rules));
   }

   let output = match (&args.github, args.pr) {
      (Some(repo), Some(number)) => run_pr_mode(args, &rules, repo, number)?,
      _ => run_local_mode(args, &rules)?,
   };
   print_output(args, &output)?;
   Ok(0)
}

fn check_ruleset(rules: &RuleSet) -> i32 {
   let issues = validate::validate(rules);
   if issues.is_empty() {
      style::print_info("Ruleset is valid");
      return 0;
   }
   for issue in &issues {
      style::warn(&issue.to_string());
   }
   eprintln!("{}", style::error(&format!("{} problem(s) found", issues.len())));
   1
}

fn run_test_mode(args: &Args) -> Result<i32> {
   let dir = args
      .fixtures_dir
      .clone()
      .unwrap_or_else(testing::fixtures_dir);
   let runner = testing::TestRunner::new(&dir)
      .with_filter(args.test_filter.clone())
      .with_update(args.test_update);

   if args.test_list {
      for name in runner.list()? {
         println!("{name}");
      }
      return Ok(0);
   }

   let summary = runner.run_all()?;
   for result in &summary.results {
      if result.passed {
         println!("{} {}", style::success(style::icons::SUCCESS), result.name);
      } else {
         println!("{} {}", style::error(style::icons::ERROR), result.name);
         println!("{}", result.detail);
      }
   }
   println!(
      "{} passed, {} failed",
      summary.passed(),
      summary.failed()
   );
   Ok(i32::from(!summary.all_passed()))
}

fn run_local_mode(args: &Args, rules: &RuleSet) -> Result<RunOutput> {
   let diff_text = match &args.diff {
      Some(path) => std::fs::read_to_string(path)?,
      None => git::diff_range(&args.dir, &args.base, &args.head)?,
   };
   let files = parse_diff(&diff_text);

   let provider = git::GitContentProvider::new(&args.dir);
   let ctx = ProcessContext::new(&provider, &args.base, &args.head);
   Ok(runner::run(&files, rules, &ctx))
}

fn run_pr_mode(args: &Args, rules: &RuleSet, repo: &str, number: u64) -> Result<RunOutput> {
   let (owner, name) = repo
      .split_once('/')
      .ok_or_else(|| VigilError::Other("--github expects owner/repo".to_string()))?;

   let token = args
      .token
      .clone()
      .or_else(|| std::env::var("GITHUB_TOKEN").ok());
   let client = github::GithubClient::new(token)?;

   let diff_text = client.pr_diff(owner, name, number)?;
   let (base, head) = client.pr_refs(owner, name, number)?;
   let files = parse_diff(&diff_text);

   let provider = github::GithubContentProvider::new(client, owner, name);
   let ctx = ProcessContext::new(&provider, &base, &head);
   Ok(runner::run(&files, rules, &ctx))
}

fn print_output(args: &Args, output: &RunOutput) -> Result<()> {
   if args.json {
      println!("{}", serde_json::to_string_pretty(output)?);
      return Ok(());
   }

   // Per-signal failures never abort a run; surface them on stderr so
   // piped report output stays clean
   for failure in &output.failures {
      let file = failure.file.as_deref().unwrap_or("-");
      style::warn(&format!(
         "{} / {} on {file}: {}",
         failure.concern, failure.signal, failure.error
      ));
   }

   println!("{}", output::render_human(output, style::term_width()));
   Ok(())
}
