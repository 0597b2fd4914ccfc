// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The working clone: creates or updates the job's checkout directory,
//! cleans it, fetches the right thing, and checks it out.

use std::path::{Path, PathBuf};

use jx_core::GitOptions;

use crate::error::{CheckoutError, GitOpKind};
use crate::gitops::{run_git, run_git_capturing};
use crate::refname;

/// Everything the working clone needs to know about the commit it's
/// aiming for, independent of job-wide configuration (build path,
/// plugins, secrets, ...) that `jx-checkout` has no business knowing.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub repository: String,
    pub commit: String,
    pub branch: String,
    pub refspec: Option<String>,
    pub pull_request: Option<String>,
    pub pipeline_provider: String,
    pub checkout_dir: PathBuf,
    pub git: GitOptions,
}

/// Which ref the fetch step pulled, and therefore what `checkout` should
/// name: a fetch that landed on `FETCH_HEAD` always checks that out, a
/// plain commit fetch checks out the commit by name (so `HEAD` still
/// resolves sensibly if the fetch is later replayed against a
/// different branch).
#[derive(Debug, PartialEq, Eq)]
enum FetchTarget {
    FetchHead,
    Commit(String),
}

pub async fn clone_or_update(req: &CheckoutRequest, reference: Option<&Path>) -> Result<(), CheckoutError> {
    ensure_working_clone(req, reference).await?;
    clean(req).await?;
    let target = fetch(req).await?;
    checkout(req, &target).await?;
    if req.git.submodules {
        submodules(req, reference).await?;
    }
    Ok(())
}

async fn ensure_working_clone(req: &CheckoutRequest, reference: Option<&Path>) -> Result<(), CheckoutError> {
    if req.checkout_dir.join(".git").exists() {
        run_git(
            Some(&req.checkout_dir),
            &["remote", "set-url", "origin", &req.repository],
            GitOpKind::Clone,
        )
        .await?;
        return Ok(());
    }

    tokio::fs::create_dir_all(&req.checkout_dir).await?;
    let mut args: Vec<&str> = vec!["clone"];
    args.extend(req.git.clone_flags.iter().map(String::as_str));
    let reference_arg;
    if let Some(reference) = reference {
        reference_arg = reference.to_string_lossy().into_owned();
        args.push("--reference");
        args.push(&reference_arg);
    }
    let dir = req.checkout_dir.to_string_lossy();
    args.push(&req.repository);
    args.push(&dir);
    run_git(None, &args, GitOpKind::Clone).await
}

async fn clean(req: &CheckoutRequest) -> Result<(), CheckoutError> {
    let mut args: Vec<&str> = vec!["clean"];
    if req.git.clean_flags.is_empty() {
        args.push("-fxdq");
    } else {
        args.extend(req.git.clean_flags.iter().map(String::as_str));
    }
    run_git(Some(&req.checkout_dir), &args, GitOpKind::Clean).await?;

    if req.git.submodules {
        run_git(
            Some(&req.checkout_dir),
            &["submodule", "foreach", "--recursive", "git", "clean", "-fxdq"],
            GitOpKind::CleanSubmodule,
        )
        .await?;
    }
    Ok(())
}

async fn fetch(req: &CheckoutRequest) -> Result<FetchTarget, CheckoutError> {
    let mut args: Vec<&str> = vec!["fetch"];
    args.extend(req.git.fetch_flags.iter().map(String::as_str));
    args.push("origin");

    let is_github_like = req.pipeline_provider.to_ascii_lowercase().contains("github");

    if let Some(refspec) = &req.refspec {
        let mut full = args.clone();
        full.push(refspec);
        run_git(Some(&req.checkout_dir), &full, GitOpKind::Fetch).await?;
        return Ok(FetchTarget::FetchHead);
    }

    if is_github_like {
        if let Some(pr) = &req.pull_request {
            let pr_ref = format!("refs/pull/{pr}/head");
            let mut full = args.clone();
            full.push(&pr_ref);
            run_git(Some(&req.checkout_dir), &full, GitOpKind::Fetch).await?;
            return Ok(FetchTarget::FetchHead);
        }
    }

    if req.commit == "HEAD" {
        let mut full = args.clone();
        full.push(&req.branch);
        run_git(Some(&req.checkout_dir), &full, GitOpKind::Fetch).await?;
        return Ok(FetchTarget::FetchHead);
    }

    refname::validate(&req.commit)?;
    let mut full = args.clone();
    full.push(&req.commit);
    if run_git(Some(&req.checkout_dir), &full, GitOpKind::Fetch).await.is_err() {
        // Some servers refuse to serve an arbitrary commit by name; fall
        // back to a full fetch and hope the commit is already reachable.
        let mut fallback = vec!["fetch", "--tags", "origin"];
        fallback.extend(req.git.fetch_flags.iter().map(String::as_str));
        run_git(Some(&req.checkout_dir), &fallback, GitOpKind::Fetch).await?;
    }
    Ok(FetchTarget::Commit(req.commit.clone()))
}

async fn checkout(req: &CheckoutRequest, target: &FetchTarget) -> Result<(), CheckoutError> {
    let ref_arg = match target {
        FetchTarget::FetchHead => "FETCH_HEAD".to_string(),
        FetchTarget::Commit(commit) => {
            refname::validate(commit)?;
            commit.clone()
        }
    };
    let mut args: Vec<&str> = vec!["checkout"];
    args.extend(req.git.checkout_flags.iter().map(String::as_str));
    args.push("-f");
    args.push(&ref_arg);
    run_git(Some(&req.checkout_dir), &args, GitOpKind::Checkout).await
}

async fn submodules(req: &CheckoutRequest, reference: Option<&Path>) -> Result<(), CheckoutError> {
    run_git(
        Some(&req.checkout_dir),
        &["submodule", "sync", "--recursive"],
        GitOpKind::Checkout,
    )
    .await?;

    let mut args: Vec<&str> = vec!["submodule", "update", "--init", "--recursive", "--force"];
    let reference_arg;
    if let Some(reference) = reference {
        reference_arg = reference.to_string_lossy().into_owned();
        args.push("--reference");
        args.push(&reference_arg);
    }
    run_git(Some(&req.checkout_dir), &args, GitOpKind::Checkout).await?;

    run_git(
        Some(&req.checkout_dir),
        &["submodule", "foreach", "--recursive", "git", "reset", "--hard"],
        GitOpKind::Checkout,
    )
    .await?;

    if req.git.ssh_keyscan {
        keyscan_submodules(req).await?;
    }
    Ok(())
}

async fn keyscan_submodules(req: &CheckoutRequest) -> Result<(), CheckoutError> {
    let urls = run_git_capturing(
        Some(&req.checkout_dir),
        &["submodule", "foreach", "--recursive", "git", "config", "--get", "remote.origin.url"],
        GitOpKind::Checkout,
    )
    .await?;
    let known_hosts = crate::keyscan::default_known_hosts();
    for line in urls.lines() {
        if let Some(host) = crate::keyscan::extract_host(line.trim()) {
            crate::keyscan::keyscan_into(host, &known_hosts).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "clone_tests.rs"]
mod tests;
