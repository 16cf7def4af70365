use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use cpm_core::repositories::history::HistoryRepository;
use cpm_core::repositories::patients::PatientRepository;
use cpm_core::repositories::requests::RequestRepository;
use cpm_core::{
    constants::DEFAULT_CLINIC_DATA_DIR, CoreConfig, DischargePolicy, DischargeRequest,
    DischargeService, Patient, PatientDraft, PatientService, RecordId, StaffRef,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cpm")]
#[command(about = "CPM clinic practice management CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    List,
    /// Intake a new patient
    Intake {
        /// Given names (comma-separated)
        given_names: String,
        /// Last name
        last_name: String,
        /// Assigned therapist ID (optional)
        #[arg(long)]
        therapist: Option<String>,
        /// Assigned clinical staff ID (optional)
        #[arg(long)]
        clinical: Option<String>,
        /// Level of care / program assignment (optional)
        #[arg(long)]
        loc: Option<String>,
    },
    /// Change a patient's lifecycle status (manual staff edit)
    SetStatus {
        /// Patient ID
        patient_id: String,
        /// New status: active, inactive, or discharged
        status: String,
        /// Acting staff role: frontdesk, clinician, supervisor, or admin
        role: String,
    },
    /// Set or clear a patient's level of care (omit the value to clear)
    SetLevelOfCare {
        /// Patient ID
        patient_id: String,
        /// Level of care; omit to remove the patient from their program
        level_of_care: Option<String>,
    },
    /// Record an appointment in a patient's log
    RecordAppointment {
        /// Patient ID
        patient_id: String,
        /// Appointment time (RFC 3339, e.g. 2026-08-01T10:00:00Z)
        scheduled_at: String,
        /// Status: scheduled, attended, cancelled, or no_show
        status: String,
    },
    /// Add a treatment goal to a patient's plan
    AddGoal {
        /// Patient ID
        patient_id: String,
        /// Goal description
        description: String,
    },
    /// Mark a treatment goal complete
    CompleteGoal {
        /// Patient ID
        patient_id: String,
        /// Zero-based goal index
        index: usize,
    },
    /// Record the clinician's discharge sign-off on a patient's plan
    SignOff {
        /// Patient ID
        patient_id: String,
    },
    /// Evaluate discharge criteria for a patient (read-only)
    Evaluate {
        /// Patient ID
        patient_id: String,
    },
    /// Evaluate discharge criteria and, if eligible, discharge the patient
    AutoDischarge {
        /// Patient ID
        patient_id: String,
    },
    /// Create a discharge request for review
    RequestDischarge {
        /// Patient ID
        patient_id: String,
        /// Requesting staff ID
        staff_id: String,
        /// Requesting staff role
        role: String,
        /// Reason for the request
        reason: String,
    },
    /// Approve or deny a pending discharge request
    ReviewRequest {
        /// Discharge request ID
        request_id: String,
        /// Reviewing staff ID
        reviewer_id: String,
        /// Reviewing staff role (supervisor or admin)
        role: String,
        /// Decision: approved or denied
        decision: String,
        /// Review notes (optional)
        #[arg(long)]
        notes: Option<String>,
    },
    /// List discharge requests, newest first
    ListRequests {
        /// Restrict to one patient's requests
        #[arg(long)]
        patient: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let clinic_data_dir = std::env::var("CLINIC_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLINIC_DATA_DIR));
    let policy = DischargePolicy::from_env_values(
        std::env::var("CPM_INACTIVITY_WINDOW_DAYS").ok(),
        std::env::var("CPM_MIN_ATTENDED_SESSIONS").ok(),
    )?;
    let cfg = Arc::new(CoreConfig::new(clinic_data_dir, policy)?);

    let patient_repo = PatientRepository::new(cfg.clone());
    let history_repo = HistoryRepository::new(cfg.clone());
    let request_repo = RequestRepository::new(cfg.clone());
    let patients = PatientService::new(patient_repo.clone(), history_repo.clone());
    let discharge = DischargeService::new(cfg, patient_repo, request_repo, history_repo);

    match cli.command {
        Commands::List => {
            let all = patients.list();
            if all.is_empty() {
                println!("No patients found.");
            } else {
                for patient in all {
                    print_patient(&patient);
                }
            }
        }
        Commands::Intake {
            given_names,
            last_name,
            therapist,
            clinical,
            loc,
        } => {
            let draft = PatientDraft {
                given_names: given_names
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect(),
                last_name: cpm_core::NonEmptyText::new(&last_name)?,
                assigned_therapist_id: therapist.as_deref().map(RecordId::parse).transpose()?,
                assigned_clinical_id: clinical.as_deref().map(RecordId::parse).transpose()?,
                level_of_care: loc
                    .as_deref()
                    .map(cpm_core::NonEmptyText::new)
                    .transpose()?,
            };
            let patient = patients.intake(draft)?;
            println!("Created patient {}", patient.id);
        }
        Commands::SetStatus {
            patient_id,
            status,
            role,
        } => {
            let patient = patients.set_status(
                &RecordId::parse(&patient_id)?,
                status.parse()?,
                role.parse()?,
            )?;
            print_patient(&patient);
        }
        Commands::SetLevelOfCare {
            patient_id,
            level_of_care,
        } => {
            let patient = patients
                .set_level_of_care(&RecordId::parse(&patient_id)?, level_of_care.as_deref())?;
            match &patient.level_of_care {
                Some(loc) => println!("Patient {} assigned to {}", patient.id, loc),
                None => println!("Patient {} removed from program", patient.id),
            }
        }
        Commands::RecordAppointment {
            patient_id,
            scheduled_at,
            status,
        } => {
            let scheduled_at: DateTime<Utc> =
                DateTime::parse_from_rfc3339(&scheduled_at)?.with_timezone(&Utc);
            let appointment = patients.record_appointment(
                &RecordId::parse(&patient_id)?,
                scheduled_at,
                status.parse()?,
            )?;
            println!(
                "Recorded appointment {} ({}) at {}",
                appointment.id, appointment.status, appointment.scheduled_at
            );
        }
        Commands::AddGoal {
            patient_id,
            description,
        } => {
            let plan = patients.add_goal(&RecordId::parse(&patient_id)?, &description)?;
            println!("Plan now has {} goal(s)", plan.goals.len());
        }
        Commands::CompleteGoal { patient_id, index } => {
            let plan = patients.complete_goal(&RecordId::parse(&patient_id)?, index)?;
            let done = plan.goals.iter().filter(|g| g.complete).count();
            println!("{}/{} goal(s) complete", done, plan.goals.len());
        }
        Commands::SignOff { patient_id } => {
            patients.record_sign_off(&RecordId::parse(&patient_id)?)?;
            println!("Clinician sign-off recorded for patient {}", patient_id);
        }
        Commands::Evaluate { patient_id } => {
            let evaluation = discharge.evaluate(&RecordId::parse(&patient_id)?)?;
            println!("Should discharge: {}", evaluation.result.should_discharge);
            println!("Reason: {}", evaluation.result.reason);
            for criterion in &evaluation.result.criteria {
                println!("  [met] {}", criterion);
            }
        }
        Commands::AutoDischarge { patient_id } => {
            let patient_id = RecordId::parse(&patient_id)?;
            let evaluation = discharge.evaluate(&patient_id)?;
            match evaluation.token {
                Some(token) => {
                    let patient = discharge.auto_discharge(&patient_id, &token)?;
                    println!(
                        "Patient {} discharged at {}",
                        patient.id,
                        patient
                            .discharge_date
                            .map(|dt| dt.to_rfc3339())
                            .unwrap_or_default()
                    );
                }
                None => {
                    println!("Not eligible: {}", evaluation.result.reason);
                }
            }
        }
        Commands::RequestDischarge {
            patient_id,
            staff_id,
            role,
            reason,
        } => {
            let request = discharge.create_request(
                &RecordId::parse(&patient_id)?,
                StaffRef {
                    id: RecordId::parse(&staff_id)?,
                    role: role.parse()?,
                },
                &reason,
            )?;
            println!("Created discharge request {} (pending)", request.id);
        }
        Commands::ReviewRequest {
            request_id,
            reviewer_id,
            role,
            decision,
            notes,
        } => {
            let request = discharge.review_request(
                &RecordId::parse(&request_id)?,
                StaffRef {
                    id: RecordId::parse(&reviewer_id)?,
                    role: role.parse()?,
                },
                decision.parse()?,
                notes.as_deref(),
            )?;
            print_request(&request);
        }
        Commands::ListRequests { patient } => {
            let patient_id = patient.as_deref().map(RecordId::parse).transpose()?;
            let requests = discharge.list_requests(patient_id.as_ref());
            if requests.is_empty() {
                println!("No discharge requests found.");
            } else {
                for request in requests {
                    print_request(&request);
                }
            }
        }
    }

    Ok(())
}

fn print_patient(patient: &Patient) {
    println!(
        "ID: {}, Name: {} {}, Status: {}, LOC: {}, Intake: {}",
        patient.id,
        patient.given_names.join(" "),
        patient.last_name,
        patient.status,
        patient.level_of_care.as_deref().unwrap_or("-"),
        patient.intake_date.to_rfc3339()
    );
}

fn print_request(request: &DischargeRequest) {
    let reviewed = match request.review() {
        Some(review) => format!(
            ", Reviewed by: {} ({}) at {}",
            review.reviewed_by.id,
            review.reviewed_by.role,
            review.reviewed_at.to_rfc3339()
        ),
        None => String::new(),
    };
    println!(
        "ID: {}, Patient: {}, Status: {}, Requested: {}, Reason: {}{}",
        request.id,
        request.patient_id,
        request.status_label(),
        request.requested_at.to_rfc3339(),
        request.reason,
        reviewed
    );
}
