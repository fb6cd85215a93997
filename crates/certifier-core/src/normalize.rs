//! Evidence normalization
//!
//! Turns a submitted evidence package into authenticated facts. Every item
//! is signature-checked through the [`StatementVerifier`] and every `says`
//! clause must be spoken by the key that signed it. The authenticated items
//! are then matched against the fixed layout of the evidence format, and the
//! initial proved statements are laid down in canonical order, starting from
//! the `policyKey is-trusted` anchor.
//!
//! Any failure rejects the whole package.
//!
//! Gramine evidence is the exception to chain checking: no policy statement
//! endorses the key that signed the report, so the report's binding becomes
//! a fact on signature alone. Any key can sign a Gramine report, and the
//! only remaining gate is the measurement policy. Each such acceptance is
//! logged at `warn` with the attester key.

use crate::clause::Clause;
use crate::crypto::StatementVerifier;
use crate::error::{CertifierError, Result};
use crate::evidence::{EvidenceFormat, EvidenceItem, EvidencePackage, SignedStatement, VSE_VERIFIER};
use crate::proof::ProvedStatements;
use crate::types::{KeyEntity, Measurement, PlatformDescriptor, Verb};
use tracing::{debug, warn};

/// `issuer says subject is-trusted-for-attestation`
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEndorsement {
    pub issuer: KeyEntity,
    pub subject: KeyEntity,
    pub clause: Clause,
}

/// `attester says enclave_key speaks-for measurement`
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementBinding {
    pub attester: KeyEntity,
    pub enclave_key: KeyEntity,
    pub measurement: Measurement,
    /// Platform properties, when the binding came from a report carrying them
    pub platform: Option<PlatformDescriptor>,
    pub clause: Clause,
}

impl MeasurementBinding {
    /// The unwrapped `enclave_key speaks-for measurement`
    pub fn speaks_for(&self) -> Clause {
        Clause::speaks_for(self.enclave_key.clone(), self.measurement.clone())
    }
}

/// Normalized evidence, one variant per pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvidence {
    /// full-vse-support, platform-attestation-only
    PlatformChain {
        platform: KeyEndorsement,
        binding: MeasurementBinding,
    },
    /// augmented-platform-attestation-only
    PolicyEndorsed {
        endorsement: KeyEndorsement,
        binding: MeasurementBinding,
    },
    /// sev-evidence, sev-platform-attestation-only
    Sev {
        ark: KeyEndorsement,
        ask: KeyEndorsement,
        vcek: KeyEndorsement,
        binding: MeasurementBinding,
    },
    /// oe-evidence
    Oe { binding: MeasurementBinding },
    /// gramine-evidence
    Gramine { binding: MeasurementBinding },
}

impl NormalizedEvidence {
    /// The terminal measurement binding
    pub fn binding(&self) -> &MeasurementBinding {
        match self {
            NormalizedEvidence::PlatformChain { binding, .. }
            | NormalizedEvidence::PolicyEndorsed { binding, .. }
            | NormalizedEvidence::Sev { binding, .. }
            | NormalizedEvidence::Oe { binding }
            | NormalizedEvidence::Gramine { binding } => binding,
        }
    }
}

/// Output of normalization
#[derive(Debug, Clone)]
pub struct Normalized {
    pub format: EvidenceFormat,
    pub evidence: NormalizedEvidence,
    pub proved: ProvedStatements,
}

/// An authenticated evidence item
#[derive(Debug, Clone)]
enum Authenticated {
    Endorsement(KeyEndorsement),
    Binding(MeasurementBinding),
}

impl Authenticated {
    fn kind(&self) -> &'static str {
        match self {
            Authenticated::Endorsement(_) => "endorsement",
            Authenticated::Binding(_) => "binding",
        }
    }
}

/// Verify a signed statement and check the signer speaks it
///
/// Returns the verified `says` clause. Shared with fact augmentation so
/// policy statements pass the same checks as evidence.
pub fn authenticate_statement(
    verifier: &dyn StatementVerifier,
    statement: &SignedStatement,
) -> Result<Clause> {
    let clause = verifier.verify_signed_statement(statement, &statement.signing_key)?;
    let (speaker, _) = clause
        .as_says()
        .ok_or_else(|| CertifierError::malformed(format!("statement is not a says clause: {}", clause)))?;
    if !speaker.same_key(&statement.signing_key) {
        return Err(CertifierError::UnverifiableSignature(format!(
            "statement signed by {} but spoken by {}",
            statement.signing_key, speaker
        )));
    }
    Ok(clause)
}

/// Evidence normalizer for one trusted policy key
pub struct EvidenceNormalizer<'a> {
    verifier: &'a dyn StatementVerifier,
    policy_key: &'a KeyEntity,
}

impl<'a> EvidenceNormalizer<'a> {
    pub fn new(verifier: &'a dyn StatementVerifier, policy_key: &'a KeyEntity) -> Self {
        Self {
            verifier,
            policy_key,
        }
    }

    /// Authenticate a package and lay down its initial facts
    pub fn normalize(&self, format: EvidenceFormat, package: &EvidencePackage) -> Result<Normalized> {
        if package.prover_type != VSE_VERIFIER {
            return Err(CertifierError::UnsupportedProver(package.prover_type.clone()));
        }

        let items = self.authenticate_items(format, package)?;
        let evidence = self.match_layout(format, items)?;
        let proved = self.initial_facts(&evidence);

        debug!(
            format = %format,
            facts = proved.len(),
            enclave_key = %evidence.binding().enclave_key,
            "Normalized evidence"
        );

        Ok(Normalized {
            format,
            evidence,
            proved,
        })
    }

    fn authenticate_items(
        &self,
        format: EvidenceFormat,
        package: &EvidencePackage,
    ) -> Result<Vec<Authenticated>> {
        let mut authenticated = Vec::with_capacity(package.items.len());

        for item in &package.items {
            match item {
                EvidenceItem::SignedClaim(statement) => {
                    authenticated.push(self.authenticate_claim(statement)?);
                }
                EvidenceItem::Cert(statement) => {
                    authenticated.push(Authenticated::Endorsement(self.authenticate_cert(statement)?));
                }
                EvidenceItem::CertChain { certs } => {
                    if certs.is_empty() {
                        return Err(CertifierError::malformed("empty cert-chain"));
                    }
                    for cert in certs {
                        authenticated.push(Authenticated::Endorsement(self.authenticate_cert(cert)?));
                    }
                }
                EvidenceItem::AttestationReport(signed) => {
                    let report = self.verifier.verify_report(signed, &signed.signing_key)?;
                    if report.platform != format.report_platform() {
                        return Err(CertifierError::malformed(format!(
                            "{} report submitted as {}",
                            report.platform, format
                        )));
                    }
                    if report.measurement.is_empty() {
                        return Err(CertifierError::malformed("report has empty measurement"));
                    }
                    authenticated.push(Authenticated::Binding(MeasurementBinding {
                        attester: signed.signing_key.clone(),
                        enclave_key: report.enclave_key.clone(),
                        measurement: report.measurement.clone(),
                        platform: report.platform_descriptor.clone(),
                        clause: report.binding_clause(&signed.signing_key),
                    }));
                }
            }
        }

        Ok(authenticated)
    }

    fn authenticate_claim(&self, statement: &SignedStatement) -> Result<Authenticated> {
        let clause = authenticate_statement(self.verifier, statement)?;
        if let Some(endorsement) = as_endorsement(&clause) {
            return Ok(Authenticated::Endorsement(endorsement));
        }
        as_binding(&clause).map(Authenticated::Binding).ok_or_else(|| {
            CertifierError::malformed(format!("unsupported signed claim: {}", clause))
        })
    }

    fn authenticate_cert(&self, statement: &SignedStatement) -> Result<KeyEndorsement> {
        let clause = authenticate_statement(self.verifier, statement)?;
        as_endorsement(&clause)
            .ok_or_else(|| CertifierError::malformed(format!("cert is not an endorsement: {}", clause)))
    }

    fn match_layout(
        &self,
        format: EvidenceFormat,
        items: Vec<Authenticated>,
    ) -> Result<NormalizedEvidence> {
        let layout: Vec<&'static str> = items.iter().map(Authenticated::kind).collect();
        let unexpected = || {
            CertifierError::malformed(format!(
                "{} evidence has unexpected layout [{}]",
                format,
                layout.join(", ")
            ))
        };

        match format {
            EvidenceFormat::FullVseSupport | EvidenceFormat::PlatformAttestationOnly => {
                let [Authenticated::Endorsement(platform), Authenticated::Binding(binding)] =
                    <[Authenticated; 2]>::try_from(items).map_err(|_| unexpected())?
                else {
                    return Err(unexpected());
                };
                require_signed_by(&binding.attester, &platform.subject, "binding")?;
                Ok(NormalizedEvidence::PlatformChain { platform, binding })
            }
            EvidenceFormat::AugmentedPlatformAttestationOnly => {
                let [Authenticated::Endorsement(endorsement), Authenticated::Binding(binding)] =
                    <[Authenticated; 2]>::try_from(items).map_err(|_| unexpected())?
                else {
                    return Err(unexpected());
                };
                if !endorsement.issuer.same_key(self.policy_key) {
                    return Err(CertifierError::UnverifiableSignature(format!(
                        "attestation key endorsed by {}, not the policy key",
                        endorsement.issuer
                    )));
                }
                require_signed_by(&binding.attester, &endorsement.subject, "binding")?;
                Ok(NormalizedEvidence::PolicyEndorsed {
                    endorsement,
                    binding,
                })
            }
            EvidenceFormat::SevEvidence | EvidenceFormat::SevPlatformAttestationOnly => {
                let [Authenticated::Endorsement(ark), Authenticated::Endorsement(ask), Authenticated::Endorsement(vcek), Authenticated::Binding(binding)] =
                    <[Authenticated; 4]>::try_from(items).map_err(|_| unexpected())?
                else {
                    return Err(unexpected());
                };
                if !ark.issuer.same_key(&ark.subject) {
                    return Err(CertifierError::malformed("ARK endorsement is not self-signed"));
                }
                require_signed_by(&ask.issuer, &ark.subject, "ASK endorsement")?;
                require_signed_by(&vcek.issuer, &ask.subject, "VCEK endorsement")?;
                require_signed_by(&binding.attester, &vcek.subject, "report")?;
                Ok(NormalizedEvidence::Sev {
                    ark,
                    ask,
                    vcek,
                    binding,
                })
            }
            EvidenceFormat::OeEvidence => {
                let [Authenticated::Binding(binding)] =
                    <[Authenticated; 1]>::try_from(items).map_err(|_| unexpected())?
                else {
                    return Err(unexpected());
                };
                Ok(NormalizedEvidence::Oe { binding })
            }
            EvidenceFormat::GramineEvidence => {
                let [Authenticated::Binding(binding)] =
                    <[Authenticated; 1]>::try_from(items).map_err(|_| unexpected())?
                else {
                    return Err(unexpected());
                };
                Ok(NormalizedEvidence::Gramine { binding })
            }
        }
    }

    fn initial_facts(&self, evidence: &NormalizedEvidence) -> ProvedStatements {
        let mut proved = ProvedStatements::new(Clause::is_trusted(self.policy_key.clone()));

        match evidence {
            NormalizedEvidence::PlatformChain { platform, binding } => {
                proved.push(platform.clause.clone());
                proved.push(binding.clause.clone());
            }
            NormalizedEvidence::PolicyEndorsed {
                endorsement,
                binding,
            } => {
                proved.push(endorsement.clause.clone());
                proved.push(binding.clause.clone());
            }
            NormalizedEvidence::Sev {
                ark,
                ask,
                vcek,
                binding,
            } => {
                proved.push(ark.clause.clone());
                proved.push(ask.clause.clone());
                proved.push(vcek.clause.clone());
                proved.push(binding.clause.clone());
            }
            NormalizedEvidence::Oe { binding } => {
                proved.push(binding.clause.clone());
            }
            NormalizedEvidence::Gramine { binding } => {
                // The report was authenticated by the verifier; its binding
                // stands as a fact without a policy-endorsed platform key.
                warn!(
                    attester = %binding.attester,
                    enclave_key = %binding.enclave_key,
                    "Accepting gramine binding from an unendorsed attester"
                );
                proved.push(binding.clause.clone());
                proved.push(binding.speaks_for());
            }
        }

        proved
    }
}

fn require_signed_by(actual: &KeyEntity, expected: &KeyEntity, what: &str) -> Result<()> {
    if actual.same_key(expected) {
        Ok(())
    } else {
        Err(CertifierError::malformed(format!(
            "{} signed by {}, expected {}",
            what, actual, expected
        )))
    }
}

fn as_endorsement(clause: &Clause) -> Option<KeyEndorsement> {
    let (issuer, quoted) = clause.as_says()?;
    if !quoted.is_unary(Verb::IsTrustedForAttestation) {
        return None;
    }
    Some(KeyEndorsement {
        issuer: issuer.clone(),
        subject: quoted.subject_key()?.clone(),
        clause: clause.clone(),
    })
}

fn as_binding(clause: &Clause) -> Option<MeasurementBinding> {
    let (attester, quoted) = clause.as_says()?;
    if quoted.verb != Verb::SpeaksFor || quoted.clause.is_some() {
        return None;
    }
    let measurement = quoted.object_measurement()?;
    if measurement.is_empty() {
        return None;
    }
    Some(MeasurementBinding {
        attester: attester.clone(),
        enclave_key: quoted.subject_key()?.clone(),
        measurement: measurement.clone(),
        platform: None,
        clause: clause.clone(),
    })
}
