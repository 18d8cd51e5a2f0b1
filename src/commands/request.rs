/// `spectre request` command implementation
///
/// Builds a request from the arguments, sends it and prints the response.
use anyhow::{Context, Result};

use spectre::http::{Method, PaperSize, Request};
use spectre::Response;

use super::{client, tag};
use crate::cli::{CommonArgs, RequestArgs};

pub fn run(common: &CommonArgs, args: &RequestArgs) -> Result<()> {
    let request = build_request(args)?;
    let client = client(common)?;

    let response = client
        .send(&request)
        .with_context(|| format!("Request to {} failed", args.url))?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
        println!("{}", json);
    } else {
        print_response(&response);
    }

    if let Some(file) = request.output_file() {
        eprintln!("{} Saved {}", tag(), file.display());
    }

    if common.debug {
        let log = client.engine().get_log();
        if !log.is_empty() {
            eprintln!("{} Runtime log:\n{}", tag(), log.trim_end());
        }
    }

    Ok(())
}

fn build_request(args: &RequestArgs) -> Result<Request> {
    let method: Method = args.method.parse()?;

    let mut request = match (&args.capture, &args.pdf) {
        (Some(file), _) => Request::capture(&args.url, file),
        (None, Some(file)) => Request::pdf(&args.url, file),
        (None, None) => Request::get(&args.url),
    }
    .with_method(method);

    for (name, value) in &args.headers {
        request = request.with_header(name, value);
    }
    for (key, value) in &args.data {
        request = request.with_data(key, value);
    }
    if let Some(timeout) = args.timeout {
        request = request.with_timeout(timeout);
    }
    if let Some(delay) = args.delay {
        request = request.with_delay(delay);
    }
    if let Some((width, height)) = args.viewport {
        request = request.with_viewport(width, height);
    }
    if let Some(format) = &args.format {
        request = request.with_format(format);
    }
    if let Some(quality) = args.quality {
        request = request.with_quality(quality);
    }
    if args.paper.is_some() || args.orientation.is_some() {
        let mut paper = PaperSize::default();
        if let Some(format) = &args.paper {
            paper.format = Some(format.clone());
        }
        if let Some(orientation) = &args.orientation {
            paper.orientation = orientation.clone();
        }
        request = request.with_paper(paper);
    }

    request.validate()?;
    Ok(request)
}

fn print_response(response: &Response) {
    match (response.status(), response.status_text()) {
        (Some(status), Some(text)) => println!("{} {}", status, text),
        (Some(status), None) => println!("{}", status),
        _ => println!("(no status)"),
    }

    for (name, value) in response.headers() {
        println!("{}: {}", name, value);
    }

    if response.is_redirect() {
        if let Some(location) = response.redirect_url() {
            println!("Redirect: {}", location);
        }
    }

    for message in response.console() {
        eprintln!("{} console: {}", tag(), message.message);
    }

    if let Some(content) = response.content().filter(|c| !c.is_empty()) {
        println!();
        println!("{}", content);
    }
}
