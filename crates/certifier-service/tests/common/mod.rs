//! Shared fixtures for service tests

#![allow(dead_code)]

use std::sync::Arc;

use certifier_core::{
    AttestationReport, Certifier, Clause, EvidenceItem, EvidencePackage, KeyPair, Measurement,
    PolicyIndex, ReportPlatform, SignedStatement, Verb,
};
use certifier_service::{AppState, EventLog, MemoryEventLog, PolicyAuthority, TrustRequest};
use chrono::Duration;

pub struct Fixture {
    pub admin: KeyPair,
    pub platform: KeyPair,
    pub attest: KeyPair,
    pub ark: KeyPair,
    pub ask: KeyPair,
    pub vcek: KeyPair,
    pub enclave: KeyPair,
    pub measurement: Measurement,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            admin: KeyPair::generate("policy-key"),
            platform: KeyPair::generate("platform-key"),
            attest: KeyPair::generate("attest-key"),
            ark: KeyPair::generate("ark"),
            ask: KeyPair::generate("ask"),
            vcek: KeyPair::generate("vcek"),
            enclave: KeyPair::generate("app-enclave"),
            measurement: Measurement::new(vec![0x3c; 32]),
        }
    }

    pub fn policy(&self, quoted: Clause) -> SignedStatement {
        self.admin
            .sign_statement(&Clause::says(self.admin.entity(), quoted))
            .expect("sign policy")
    }

    pub fn measurement_policy(&self) -> SignedStatement {
        self.policy(Clause::unary(self.measurement.clone(), Verb::IsTrusted))
    }

    pub fn platform_key_policy(&self, key: &KeyPair) -> SignedStatement {
        self.policy(Clause::trusted_for_attestation(key.entity()))
    }

    pub fn full_policy(&self) -> Vec<SignedStatement> {
        vec![
            self.measurement_policy(),
            self.platform_key_policy(&self.platform),
            self.platform_key_policy(&self.ark),
        ]
    }

    pub fn endorse(issuer: &KeyPair, subject: &KeyPair) -> SignedStatement {
        issuer
            .sign_statement(&Clause::says(
                issuer.entity(),
                Clause::trusted_for_attestation(subject.entity()),
            ))
            .expect("sign endorsement")
    }

    pub fn binding_claim(&self, attester: &KeyPair) -> SignedStatement {
        attester
            .sign_statement(&Clause::says(
                attester.entity(),
                Clause::speaks_for(self.enclave.entity(), self.measurement.clone()),
            ))
            .expect("sign binding")
    }

    pub fn report(&self, platform: ReportPlatform, attester: &KeyPair) -> EvidenceItem {
        let report = AttestationReport::new(platform, self.enclave.entity(), self.measurement.clone());
        EvidenceItem::AttestationReport(attester.sign_report(&report).expect("sign report"))
    }

    pub fn platform_package(&self) -> EvidencePackage {
        EvidencePackage::vse()
            .with_item(EvidenceItem::Cert(Self::endorse(&self.platform, &self.attest)))
            .with_item(EvidenceItem::SignedClaim(self.binding_claim(&self.attest)))
    }

    pub fn sev_package(&self) -> EvidencePackage {
        EvidencePackage::vse()
            .with_item(EvidenceItem::CertChain {
                certs: vec![
                    Self::endorse(&self.ark, &self.ark),
                    Self::endorse(&self.ark, &self.ask),
                    Self::endorse(&self.ask, &self.vcek),
                ],
            })
            .with_item(self.report(ReportPlatform::Sev, &self.vcek))
    }

    pub fn oe_package(&self) -> EvidencePackage {
        EvidencePackage::vse().with_item(self.report(ReportPlatform::Oe, &self.platform))
    }

    pub fn request(&self, tag: &str, support: EvidencePackage) -> TrustRequest {
        TrustRequest::new("relying-enclave", "app-enclave", tag, support)
    }

    /// Service state whose policy key is `admin`, with an in-memory event log
    pub fn state(&self, policy: Vec<SignedStatement>) -> Arc<AppState> {
        self.state_with_events(policy, Arc::new(MemoryEventLog::new()))
    }

    pub fn state_with_events(
        &self,
        policy: Vec<SignedStatement>,
        events: Arc<dyn EventLog>,
    ) -> Arc<AppState> {
        let certifier = Certifier::new(self.admin.entity(), PolicyIndex::build(policy));
        let authority_key = KeyPair::from_bytes(self.admin.kid(), &self.admin.signing_key_bytes());
        let authority = PolicyAuthority::with_serial_seed(authority_key, Duration::days(365), 1_000);
        Arc::new(AppState::new(certifier, authority, events))
    }
}
