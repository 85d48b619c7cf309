//! Plain-text email bodies for candidate- and staff-facing events.

use chrono::{DateTime, NaiveDate, Utc};

use super::Email;

pub fn application_received(to: &str, candidate_name: &str, job_title: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("We received your application for {job_title}"),
        text: format!(
            "Hi {candidate_name},\n\nThanks for applying for {job_title}. \
             Our recruiting team will review your application and get back to you.\n"
        ),
    }
}

pub fn application_status_changed(
    to: &str,
    candidate_name: &str,
    job_title: &str,
    status_label: &str,
    note: Option<&str>,
) -> Email {
    let mut text = format!(
        "Hi {candidate_name},\n\nYour application for {job_title} is now: {status_label}.\n"
    );
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        text.push_str(&format!("\nNote from the team: {note}\n"));
    }
    Email {
        to: to.to_string(),
        subject: format!("Update on your application for {job_title}"),
        text,
    }
}

pub struct InterviewDetails<'a> {
    pub job_title: &'a str,
    pub round: i32,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub mode_label: &'a str,
    pub location: Option<&'a str>,
}

pub fn interview_scheduled(to: &str, candidate_name: &str, details: &InterviewDetails) -> Email {
    let mut text = format!(
        "Hi {candidate_name},\n\nRound {} of your interview for {} is scheduled for {} UTC \
         ({} minutes, {}).\n",
        details.round,
        details.job_title,
        details.scheduled_at.format("%A %d %B %Y, %H:%M"),
        details.duration_minutes,
        details.mode_label,
    );
    if let Some(location) = details.location {
        text.push_str(&format!("Location: {location}\n"));
    }
    Email {
        to: to.to_string(),
        subject: format!("Interview scheduled: {} (round {})", details.job_title, details.round),
        text,
    }
}

pub fn interview_cancelled(
    to: &str,
    candidate_name: &str,
    job_title: &str,
    reason: Option<&str>,
) -> Email {
    let reason = reason
        .filter(|r| !r.trim().is_empty())
        .map(|r| format!(" Reason: {r}"))
        .unwrap_or_default();
    Email {
        to: to.to_string(),
        subject: format!("Interview cancelled: {job_title}"),
        text: format!(
            "Hi {candidate_name},\n\nYour upcoming interview for {job_title} has been cancelled.{reason}\n\
             We will be in touch about next steps.\n"
        ),
    }
}

pub fn offer_extended(
    to: &str,
    candidate_name: &str,
    designation: &str,
    joining_date: NaiveDate,
) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Your offer for {designation}"),
        text: format!(
            "Hi {candidate_name},\n\nWe are delighted to offer you the position of {designation}, \
             with a proposed joining date of {}. Sign in to review the offer letter and respond.\n",
            joining_date.format("%d %B %Y")
        ),
    }
}

pub fn requisition_decided(
    to: &str,
    raiser_name: &str,
    position_title: &str,
    approved: bool,
    comment: Option<&str>,
) -> Email {
    let outcome = if approved { "approved" } else { "rejected" };
    let mut text = format!(
        "Hi {raiser_name},\n\nYour requisition for {position_title} has been {outcome}.\n"
    );
    if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
        text.push_str(&format!("\nComment: {comment}\n"));
    }
    Email {
        to: to.to_string(),
        subject: format!("Requisition {outcome}: {position_title}"),
        text,
    }
}

pub fn document_reviewed(
    to: &str,
    candidate_name: &str,
    document_label: &str,
    approved: bool,
    comment: Option<&str>,
) -> Email {
    let text = if approved {
        format!("Hi {candidate_name},\n\nYour {document_label} has been verified.\n")
    } else {
        format!(
            "Hi {candidate_name},\n\nYour {document_label} could not be accepted: {}\n\
             Please upload a corrected copy.\n",
            comment.unwrap_or("no reason given")
        )
    };
    Email {
        to: to.to_string(),
        subject: format!("Onboarding document {}", if approved { "verified" } else { "needs attention" }),
        text,
    }
}
